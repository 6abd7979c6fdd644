use serde::{Deserialize, Serialize};

/// `GET /v1/models` listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiModelList {
    pub object: String,
    pub data: Vec<OpenAiModel>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiModel {
    pub id: String,
    pub object: String,
    pub owned_by: String,
}

impl OpenAiModelList {
    pub fn from_model_names<I, S>(model_names: I, owned_by: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let data = model_names
            .into_iter()
            .map(|model| OpenAiModel {
                id: model.into(),
                object: "model".to_string(),
                owned_by: owned_by.to_string(),
            })
            .collect();
        Self {
            object: "list".to_string(),
            data,
        }
    }
}
