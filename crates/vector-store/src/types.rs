use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Payload stored with every point. Field names are fixed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointPayload {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub code_chunk: String,
    pub content_hash: String,
}

/// A stored `(id, vector, payload)` triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// One search hit, best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub score: f32,
    pub payload: PointPayload,
}

/// Collection name for a workspace: `ws-` plus the first 16 hex chars of
/// the sha-256 of the absolute workspace path. Stable across runs so
/// reconnecting finds the same collection.
#[must_use]
pub fn collection_name_for_workspace(workspace_path: &Path) -> String {
    let digest = Sha256::digest(workspace_path.to_string_lossy().as_bytes());
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("ws-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn collection_name_is_stable_and_prefixed() {
        let a = collection_name_for_workspace(Path::new("/home/dev/project"));
        let b = collection_name_for_workspace(Path::new("/home/dev/project"));
        assert_eq!(a, b);
        assert!(a.starts_with("ws-"));
        assert_eq!(a.len(), 3 + 16);
    }

    #[test]
    fn different_workspaces_get_different_collections() {
        let a = collection_name_for_workspace(Path::new("/home/dev/project"));
        let b = collection_name_for_workspace(Path::new("/home/dev/other"));
        assert_ne!(a, b);
    }

    #[test]
    fn payload_uses_camel_case_on_the_wire() {
        let payload = PointPayload {
            file_path: "src/lib.rs".to_string(),
            start_line: 3,
            end_line: 12,
            code_chunk: "fn x() {}".to_string(),
            content_hash: "abcd".to_string(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["filePath"], "src/lib.rs");
        assert_eq!(json["startLine"], 3);
        assert_eq!(json["endLine"], 12);
        assert_eq!(json["codeChunk"], "fn x() {}");
        assert_eq!(json["contentHash"], "abcd");
    }
}
