use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{GqlClient, Union};

pub const MERGE_HIGHLIGHT_MUTATION: &str = r#"
mutation MergeHighlight($input: MergeHighlightInput!) {
  mergeHighlight(input: $input) {
    ... on MergeHighlightSuccess {
      highlight {
        id
        shortId
        quote
        prefix
        suffix
        patch
        createdAt
        updatedAt
        annotation
        sharedAt
        createdByMe
      }
      overlapHighlightIdList
    }
    ... on MergeHighlightError {
      errorCodes
    }
  }
}
"#;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: String,
    pub short_id: String,
    pub quote: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    pub patch: String,
    #[serde(default)]
    pub annotation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub shared_at: Option<DateTime<Utc>>,
    pub created_by_me: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeHighlightInput {
    pub id: String,
    pub short_id: String,
    pub article_id: String,
    pub patch: String,
    pub quote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    pub overlap_highlight_id_list: Vec<String>,
}

/// The surviving highlight and the ids it absorbed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeHighlightOutput {
    pub highlight: Highlight,
    pub overlap_highlight_id_list: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeHighlightData {
    merge_highlight: Union<MergeHighlightOutput>,
}

/// Merges overlapping highlights into one.
///
/// Returns `None` when the request fails for any reason, including the
/// server answering with its error member. Failures are logged and never
/// propagated.
pub async fn merge_highlight_mutation(
    client: &GqlClient,
    input: &MergeHighlightInput,
) -> Option<MergeHighlightOutput> {
    let result = client
        .request::<_, MergeHighlightData>(MERGE_HIGHLIGHT_MUTATION, json!({ "input": input }))
        .await
        .and_then(|data| data.merge_highlight.into_result());

    match result {
        Ok(output) => Some(output),
        Err(e) => {
            tracing::debug!(error = %e, highlight_id = %input.id, "merge highlight failed");
            None
        }
    }
}
