pub mod classification;
pub mod completion;
pub mod gate;
pub mod keys;
pub mod launch;
pub mod ocr;
pub mod postprocess;
pub mod queue;
pub mod retry;
pub mod scan;
pub mod storage;
