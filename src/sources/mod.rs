pub mod address;
pub mod candidates;
pub mod gemini;
pub mod generative;
pub mod nominatim;
pub mod overpass;
pub mod tags;
pub mod throttle;
pub mod traits;
pub mod types;

pub use address::AddressSearchSource;
pub use gemini::GeminiClient;
pub use generative::GenerativeSource;
pub use nominatim::NominatimClient;
pub use overpass::OverpassSource;
pub use traits::{AccommodationSource, CandidateSink, GenerativeSearch, Geocoder, TextModel};
pub use types::{GenerativeQuery, Place, PlaceAddress};
