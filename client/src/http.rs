//! reqwest-backed implementation of [`TodoApi`].

use crate::config::Config;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use taskboard_core::remote::{ApiFuture, RemoteError, TodoApi};
use taskboard_core::todo::{CompletedPatch, NewTodo, Removed, Todo};

/// HTTP client for the remote todo collection
#[derive(Clone, Debug)]
pub struct HttpTodoApi {
    client: Client,
    base_url: String,
    user_id: i64,
}

impl HttpTodoApi {
    /// Create a client for the service at `base_url`, creating todos for `user_id`
    #[must_use]
    pub fn new(base_url: impl Into<String>, user_id: i64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id,
        }
    }

    /// Create a client from loaded configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_url.clone(), config.user_id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Maps a non-success status to `Transport`
    fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            tracing::warn!(status = status.as_u16(), url = %response.url(), "Todo service rejected request");
            Err(RemoteError::Transport {
                status: status.as_u16(),
            })
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

fn request_failed(error: &reqwest::Error) -> RemoteError {
    tracing::warn!(error = %error, "Todo service unreachable");
    RemoteError::Request(error.to_string())
}

impl TodoApi for HttpTodoApi {
    fn list(&self, limit: u32) -> ApiFuture<'_, Vec<Todo>> {
        Box::pin(async move {
            tracing::debug!(limit, "GET /todos");
            let response = self
                .client
                .get(self.url("/todos"))
                .query(&[("_limit", limit)])
                .send()
                .await
                .map_err(|e| request_failed(&e))?;

            Self::decode(Self::check(response)?).await
        })
    }

    fn create(&self, title: String) -> ApiFuture<'_, Todo> {
        Box::pin(async move {
            tracing::debug!(title = %title, "POST /todos");
            let response = self
                .client
                .post(self.url("/todos"))
                .json(&NewTodo::new(title, self.user_id))
                .send()
                .await
                .map_err(|e| request_failed(&e))?;

            Self::decode(Self::check(response)?).await
        })
    }

    fn set_completed(&self, id: i64, completed: bool) -> ApiFuture<'_, Todo> {
        Box::pin(async move {
            tracing::debug!(id, completed, "PATCH /todos/:id");
            let response = self
                .client
                .patch(self.url(&format!("/todos/{id}")))
                .json(&CompletedPatch { completed })
                .send()
                .await
                .map_err(|e| request_failed(&e))?;

            Self::decode(Self::check(response)?).await
        })
    }

    fn remove(&self, id: i64) -> ApiFuture<'_, Removed> {
        Box::pin(async move {
            tracing::debug!(id, "DELETE /todos/:id");
            let response = self
                .client
                .delete(self.url(&format!("/todos/{id}")))
                .send()
                .await
                .map_err(|e| request_failed(&e))?;

            // The body is ignored; the status alone decides success
            Self::check(response)?;
            Ok(Removed { id })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = HttpTodoApi::new("http://localhost:3000/", 1);
        assert_eq!(api.url("/todos"), "http://localhost:3000/todos");
    }

    #[test]
    fn from_config_uses_owner() {
        let config = Config::from_lookup(|key| (key == "TASKBOARD_USER_ID").then(|| "9".to_string()));
        let api = HttpTodoApi::from_config(&config);
        assert_eq!(api.user_id, 9);
        assert_eq!(api.base_url, crate::config::DEFAULT_API_URL);
    }
}
