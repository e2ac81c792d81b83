//! RAG 모듈 - 검색 증강 엔진 + 시스템 매니저

mod engine;
mod manager;

pub use engine::{
    EngineMode, QueryResult, RagEngine, EMPTY_QUESTION_ANSWER, EMPTY_QUESTION_ERROR,
    NO_RESULTS_ANSWER, NO_RESULTS_ERROR,
};
pub use manager::{RagManager, NOT_INITIALIZED_ANSWER, NOT_INITIALIZED_ERROR};
