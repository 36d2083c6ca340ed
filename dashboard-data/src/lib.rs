//! Dashboard Data - shared core of the market dashboards
//!
//! This library holds everything the dashboards do apart from drawing:
//! - Shaping of raw API rows: series alignment, option chain pivoting and grouped normalisation
//! - Request coordination with per-key generation tokens, so superseded responses are dropped
//! - Shared selection state with master/detail panel bindings
//! - Client-side pagination of tabular data
//! - A render-agnostic [`render::ChartFrame`] plus the [`render::ChartRenderAdapter`] boundary
//! - An async HTTP client for the market data API and the [`Dashboard`] tying it all together
pub mod client;
pub mod config;
pub mod coordinator;
pub mod dashboard;
mod de;
pub mod error;
pub mod model;
pub mod pagination;
pub mod render;
pub mod selection;
pub mod transform;

// Re-export commonly used types for convenience
pub use client::{ApiClient, MarketApi, OPTION_SYMBOLS};
pub use config::DashboardConfig;
pub use coordinator::{FetchGeneration, FetchOutcome, FetchState, LogicalKey, RequestCoordinator, Ticket};
pub use dashboard::{ChartId, Dashboard, PanelId, PanelStatus};
pub use error::DataError;
pub use pagination::{PaginatedTable, PaginationSummary};
pub use render::{AxisSide, ChartFrame, ChartRenderAdapter, ChartSeries, SeriesKind, XAxis};
pub use selection::{PanelBinding, PanelRole, SelectionState, SelectionSync};
