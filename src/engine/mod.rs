pub mod r2r;
pub mod rsp_engine;
pub mod rspql_parser;

pub use r2r::{R2ROperator, Rows};
pub use rsp_engine::{DEFAULT_STREAM_IRI, RSPEngine, ResultConsumer, WindowResult};
pub use rspql_parser::{ParsedQuery, RSPQLParser, WindowDefinition};
