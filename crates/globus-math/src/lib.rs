//! Geodesy and bounding-volume math for the Globus planet renderer: ellipsoid
//! sampling, Web-Mercator projection, tile extents, and ray hits.

mod bounds;
mod ellipsoid;
mod extent;
mod lonlat;
mod ray;

pub use bounds::{BoundingBox, BoundingSphere, Bounds};
pub use ellipsoid::Ellipsoid;
pub use extent::Extent;
pub use lonlat::{LonLat, MAX_MERCATOR_LAT, POLE, forward_mercator, inverse_mercator};
pub use ray::{Ray, RayHit};
