use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a task id in hex characters (SHA-256).
pub const TASK_ID_LEN: usize = 64;

const CANONICAL_DOMAIN: &[u8] = b"pairq/task/v2";

/// How a comparison pair is reduced to its content address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskIdScheme {
    /// Sort all five fields as one flat list, join with `|`, hash.
    ///
    /// Matches the ids already stored by existing deployments.
    #[default]
    Flat,
    /// Hash the fixed-order tuple `(prompt, model_lo, model_hi, response_lo, response_hi)`.
    Canonical,
}

/// One side of a comparison: the model id and the text it produced.
#[derive(Debug, Clone, Copy)]
pub struct Side<'a> {
    pub model_id: &'a str,
    pub response: &'a str,
}

/// Computes the task id for a pair. Swapping `a` and `b` yields the same id.
pub fn compute_task_id(scheme: TaskIdScheme, prompt_id: &str, a: Side<'_>, b: Side<'_>) -> String {
    match scheme {
        TaskIdScheme::Flat => flat_task_id(prompt_id, a, b),
        TaskIdScheme::Canonical => canonical_task_id(prompt_id, a, b),
    }
}

fn flat_task_id(prompt_id: &str, a: Side<'_>, b: Side<'_>) -> String {
    let mut parts = [prompt_id, a.model_id, a.response, b.model_id, b.response];
    parts.sort_unstable();
    let mut h = Sha256::new();
    h.update(parts.join("|").as_bytes());
    hex::encode(h.finalize())
}

fn canonical_task_id(prompt_id: &str, a: Side<'_>, b: Side<'_>) -> String {
    let (lo, hi) = if (a.model_id, a.response) <= (b.model_id, b.response) {
        (a, b)
    } else {
        (b, a)
    };

    let mut h = Sha256::new();
    h.update(CANONICAL_DOMAIN);
    for field in [prompt_id, lo.model_id, hi.model_id, lo.response, hi.response] {
        // length prefix keeps field boundaries unambiguous
        h.update((field.len() as u64).to_be_bytes());
        h.update(field.as_bytes());
    }
    hex::encode(h.finalize())
}

/// True if `key` has the shape of a task id rather than a reserved key.
pub fn looks_like_task_id(key: &str) -> bool {
    key.len() == TASK_ID_LEN && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
