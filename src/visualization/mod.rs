//! Visualization layer: chart payload mapping and component rendering.

pub mod mapper;
pub mod raw_query;
pub mod renderer;

pub use mapper::{
    map_rows, CardData, ChartData, ChartPayload, Dataset, GaugeData, MappingError, Point,
    PointData, PointDataset, SeriesData, TableData,
};
pub use raw_query::{prepare_raw_query, substitute_named, PreparedRawQuery};
pub use renderer::VisualizationRenderer;
