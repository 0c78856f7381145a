use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("customer capacity exceeded ({0} connected)")]
    CustomersFull(usize),
}
