// Test module organization
pub mod scripted_runtime;
pub mod test_compile;
