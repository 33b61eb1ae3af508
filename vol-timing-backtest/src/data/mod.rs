pub mod loader;
pub mod types;

pub use loader::{ColumnMapping, LoaderError, PriceLoader, PriceSource};
pub use types::{
    DataError, PricePoint, PriceSeries, ReturnPoint, ReturnSeries, TrailingWindow, MIN_RETURNS,
    RETURN_SCALE,
};
