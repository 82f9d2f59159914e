//! Groups of identical resources cycled by random pick.
//!
//! Cycling through several copies of the same resource defeats caching
//! between consecutive iterations and hides submission latency.

use std::sync::Arc;

use membench_device::{GpuDevice, ImageTiling, MemorySelector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::noise::write_noise;
use super::{Allocate, Resource};
use crate::error::{BenchError, BenchResult};

/// An ordered group of `count >= 1` identical resources.
///
/// Dropping the group releases every member.
#[derive(Debug)]
pub struct ResourceGroup<R> {
    members: Vec<R>,
    last_pick: Option<usize>,
    rng: ChaCha8Rng,
}

impl<R: Resource> ResourceGroup<R> {
    /// Build a group of `count` members using `make`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` when `count` is zero
    /// - Whatever `make` returns; members built so far are dropped
    pub fn from_fn(
        count: usize,
        seed: u64,
        mut make: impl FnMut(usize) -> BenchResult<R>,
    ) -> BenchResult<Self> {
        if count == 0 {
            return Err(BenchError::InvalidConfig(
                "resource group needs at least one member".to_string(),
            ));
        }
        let members = (0..count).map(&mut make).collect::<BenchResult<Vec<R>>>()?;
        Ok(Self {
            members,
            last_pick: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; groups hold at least one member.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.members.get(index)
    }

    pub fn first(&self) -> &R {
        &self.members[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.members.iter()
    }

    /// Index returned by the previous pick.
    pub fn last_pick(&self) -> Option<usize> {
        self.last_pick
    }

    /// Uniform random index, never equal to the previous pick when the group
    /// has more than one member.
    pub fn pick_index(&mut self) -> usize {
        let count = self.members.len();
        if count == 1 {
            self.last_pick = Some(0);
            return 0;
        }
        let mut index = self.rng.gen_range(0..count);
        while Some(index) == self.last_pick {
            index = self.rng.gen_range(0..count);
        }
        self.last_pick = Some(index);
        index
    }

    /// Random member, see [`pick_index`](Self::pick_index).
    pub fn random_pick(&mut self) -> &R {
        let index = self.pick_index();
        &self.members[index]
    }

    /// Fill every member with pseudo-random content.
    pub fn write_noise(&mut self) -> BenchResult<()> {
        for member in &self.members {
            write_noise(member, &mut self.rng)?;
        }
        Ok(())
    }

    /// Release every member now.
    pub fn deinit(self) {
        debug!("releasing resource group of {}", self.members.len());
        drop(self);
    }
}

impl<R: Allocate> ResourceGroup<R> {
    /// Allocate `count` members of `bytes` each.
    ///
    /// `tiling` only applies to images.
    pub fn init(
        count: usize,
        device: &Arc<dyn GpuDevice>,
        bytes: u64,
        memory: MemorySelector,
        tiling: ImageTiling,
        seed: u64,
    ) -> BenchResult<Self> {
        let group = Self::from_fn(count, seed, |_| R::allocate(device, bytes, memory, tiling))?;
        debug!(
            "allocated group of {} x {} on memory type {}",
            count,
            group.first().describe(),
            group.first().memory_type_index()
        );
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membench_device::sim::{SimConfig, SimDevice, SimPreset};
    use membench_device::MemoryPropertyFlags;

    use crate::resource::{Buffer, Image};

    const MIB: u64 = 1024 * 1024;

    fn device() -> Arc<dyn GpuDevice> {
        Arc::new(SimDevice::new(SimPreset::Discrete, SimConfig::default().with_seed(4)).unwrap())
    }

    fn dl() -> MemorySelector {
        MemorySelector::Flags(MemoryPropertyFlags::DEVICE_LOCAL)
    }

    #[test]
    fn test_no_back_to_back_repeats() {
        let device = device();
        for count in [2usize, 3, 10] {
            let mut group =
                ResourceGroup::<Buffer>::init(count, &device, MIB, dl(), ImageTiling::Linear, 42)
                    .unwrap();
            let mut previous = group.pick_index();
            let mut seen = vec![false; count];
            seen[previous] = true;
            for _ in 0..1000 {
                let index = group.pick_index();
                assert_ne!(index, previous, "repeat in group of {}", count);
                seen[index] = true;
                previous = index;
            }
            assert!(seen.iter().all(|&s| s), "every member picked eventually");
        }
        println!("[PASS] 1000 picks without consecutive repeats");
    }

    #[test]
    fn test_single_member_always_zero() {
        let device = device();
        let mut group =
            ResourceGroup::<Buffer>::init(1, &device, MIB, dl(), ImageTiling::Linear, 1).unwrap();
        for _ in 0..10 {
            assert_eq!(group.pick_index(), 0);
        }
        assert_eq!(group.random_pick().id(), group.first().id());
    }

    #[test]
    fn test_groups_are_independent() {
        let device = device();
        let mut a =
            ResourceGroup::<Buffer>::init(4, &device, MIB, dl(), ImageTiling::Linear, 7).unwrap();
        let mut b =
            ResourceGroup::<Buffer>::init(4, &device, MIB, dl(), ImageTiling::Linear, 7).unwrap();
        let first_a = a.pick_index();
        // Picking from b must not affect a's no-repeat state.
        for _ in 0..5 {
            b.pick_index();
        }
        assert_eq!(a.last_pick(), Some(first_a));
    }

    #[test]
    fn test_zero_count_rejected() {
        let device = device();
        let result = ResourceGroup::<Buffer>::init(0, &device, MIB, dl(), ImageTiling::Linear, 0);
        assert!(matches!(result, Err(BenchError::InvalidConfig(_))));
    }

    #[test]
    fn test_image_group_with_noise() {
        let device = device();
        let mut group =
            ResourceGroup::<Image>::init(3, &device, 4 * MIB, dl(), ImageTiling::Optimal, 3)
                .unwrap();
        group.write_noise().unwrap();
        assert_eq!(group.len(), 3);
        assert!(group.iter().all(|image| image.tiling() == ImageTiling::Optimal));
    }

    #[test]
    fn test_failed_member_releases_earlier_ones() {
        let sim = Arc::new(SimDevice::new(SimPreset::Discrete, SimConfig::default()).unwrap());
        let device: Arc<dyn GpuDevice> = sim.clone();
        // BAR heap is 256 MiB: the third 100 MiB member cannot fit.
        let bar = MemorySelector::Flags(
            MemoryPropertyFlags::DEVICE_LOCAL | MemoryPropertyFlags::HOST_VISIBLE,
        );
        let result =
            ResourceGroup::<Buffer>::init(3, &device, 100 * MIB, bar, ImageTiling::Linear, 0);
        assert!(result.is_err());
        assert_eq!(sim.live_resources(), 0);
    }
}
