/*!
# mini-nest

The live-point core of nested sampling in the unit cube.

A [`nest::NestedSampler`] keeps `N` live points, repeatedly replaces the one
with the lowest log-likelihood by a point that strictly exceeds it, and every
few iterations refits an MLFriends region around the live points. Replacement
points come from a [`sampler::LivePointSampler`]: direct rejection sampling
from the region, or one of four step samplers (Metropolis-Hastings or slice
moves, in the cube or restricted to the region).

```rust
use mini_nest::config::NestConfig;
use mini_nest::distributions::CircGauss;
use mini_nest::nest::NestedSampler;
use mini_nest::sampler::SamplerKind;

let sampler = SamplerKind::RegionSlice.build(4, 20).unwrap();
let config = NestConfig::new(30, 2).set_seed(7);
let result = NestedSampler::new(CircGauss::new(2, 0.1), sampler, config)
    .unwrap()
    .run()
    .unwrap();
assert_eq!(result.live.len(), 30);
```
*/

pub mod config;
pub mod core;
pub mod distributions;
pub mod error;
pub mod io;
pub mod nest;
pub mod region;
pub mod rejection;
pub mod sampler;
pub mod stats;
pub mod stepsampler;
pub mod transform;
