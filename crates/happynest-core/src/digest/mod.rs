mod assembler;
mod cities;
mod service;

pub use assembler::{ClassifiedStory, FeedAssembler, NarrationScript, DEFAULT_NARRATION_LIMIT};
pub use cities::{sample_cities, CatalogCity, CITY_CATALOG};
pub use service::{CityRequest, DigestReport, DigestService, DigestTarget};
