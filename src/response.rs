use crate::serde::Serialize;

#[derive(Debug, Serialize)]
pub struct List<T> {
    list: Vec<T>,
    total: i64,
}

impl<T> List<T> {
    pub fn new(list: Vec<T>, total: i64) -> Self {
        List { list, total }
    }
}

#[derive(Debug, Serialize)]
pub struct PollResponse<T> {
    pub poll: T,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse<T> {
    pub vote: T,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
