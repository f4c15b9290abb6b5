pub mod sqlflow;
