mod batching;
mod buffering;
mod sse_parser;

pub use batching::EventBatcher;
pub use buffering::CircularLineBuffer;
pub use sse_parser::{
    parse_sse_stream, BatchLineParser, EventStream, FrameAssembler, SseFrame, SseLineParser,
};
