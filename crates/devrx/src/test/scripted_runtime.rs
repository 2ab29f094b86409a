// Device runtime double that replays scripted statuses
use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::device::{DeviceRuntime, DeviceStatus, StreamHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    GetLastError,
    PeekAtLastError,
    DeviceSynchronize,
    StreamSynchronize(StreamHandle),
}

/// Each query pops the next scripted status; an exhausted script reports
/// success.
#[derive(Default)]
pub struct ScriptedRuntime {
    last_errors: Mutex<VecDeque<DeviceStatus>>,
    syncs: Mutex<VecDeque<DeviceStatus>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_errors(self, codes: &[i32]) -> Self {
        self.last_errors.lock().unwrap().extend(codes.iter().map(|&c| DeviceStatus(c)));
        self
    }

    pub fn syncs(self, codes: &[i32]) -> Self {
        self.syncs.lock().unwrap().extend(codes.iter().map(|&c| DeviceStatus(c)));
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: Request) {
        self.requests.lock().unwrap().push(request);
    }

    fn next(queue: &Mutex<VecDeque<DeviceStatus>>) -> DeviceStatus {
        queue.lock().unwrap().pop_front().unwrap_or(DeviceStatus::SUCCESS)
    }
}

impl DeviceRuntime for ScriptedRuntime {
    fn get_last_error(&self) -> DeviceStatus {
        self.record(Request::GetLastError);
        Self::next(&self.last_errors)
    }

    fn peek_at_last_error(&self) -> DeviceStatus {
        self.record(Request::PeekAtLastError);
        self.last_errors.lock().unwrap().front().copied().unwrap_or(DeviceStatus::SUCCESS)
    }

    fn device_synchronize(&self) -> DeviceStatus {
        self.record(Request::DeviceSynchronize);
        Self::next(&self.syncs)
    }

    fn stream_synchronize(&self, stream: StreamHandle) -> DeviceStatus {
        self.record(Request::StreamSynchronize(stream));
        Self::next(&self.syncs)
    }

    fn error_name(&self, status: DeviceStatus) -> Cow<'static, str> {
        match status.code() {
            2 => Cow::Borrowed("cudaErrorMemoryAllocation"),
            700 => Cow::Borrowed("cudaErrorIllegalAddress"),
            _ => Cow::Owned(format!("error_{}", status)),
        }
    }

    fn error_string(&self, status: DeviceStatus) -> Cow<'static, str> {
        match status.code() {
            2 => Cow::Borrowed("out of memory"),
            700 => Cow::Borrowed("an illegal memory access was encountered"),
            _ => Cow::Borrowed("unknown"),
        }
    }
}
