pub mod barcharts;

pub use barcharts::{
    BarChartEndpoint, ReqwestBarChartClient, ReqwestBarChartClientParameters, DEFAULT_BASE_URL,
};
