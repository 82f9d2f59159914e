//! Pseudo-random fill for source resources.

use rand::{Rng, RngCore};
use tracing::debug;

use super::Resource;
use crate::constants::NOISE_BLOCK_BYTES;
use crate::error::BenchResult;

/// Fill `resource` with pseudo-random bytes.
///
/// One block of noise is generated and written repeatedly, rotated by a
/// random amount per chunk, so host memory stays bounded for large resources.
pub fn write_noise<R, G>(resource: &R, rng: &mut G) -> BenchResult<()>
where
    R: Resource + ?Sized,
    G: RngCore + ?Sized,
{
    let size = resource.size();
    let block_len = NOISE_BLOCK_BYTES.min(size as usize);
    let mut block = vec![0u8; block_len];
    rng.fill_bytes(&mut block);

    let mut offset = 0u64;
    while offset < size {
        let chunk = (size - offset).min(block_len as u64) as usize;
        let shift = rng.gen_range(0..block_len);
        block.rotate_left(shift);
        resource.write(offset, &block[..chunk])?;
        offset += chunk as u64;
    }
    debug!("filled {} with {} bytes of noise", resource.id(), size);
    Ok(())
}
