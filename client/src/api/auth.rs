use crate::{
    error::ClientResult,
    http::{
        to_body,
        ApiClient,
    },
    models::{
        AuthTokens,
        LoginCredentials,
        LoginResponse,
        User,
    },
    transport::Method,
};
use serde_json::json;

#[derive(Clone, Debug)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> ClientResult<(AuthTokens, User)> {
        let LoginResponse { tokens, user } = self
            .client
            .send_anonymous(Method::Post, "/api/v1/auth/token/", Some(to_body(credentials)?))
            .await?;
        Ok((tokens, user))
    }

    pub async fn current_user(&self) -> ClientResult<User> {
        self.client.get("/api/v1/auth/user/").await
    }

    /// Revokes the token on the server.
    pub async fn logout(&self) -> ClientResult<()> {
        self.client.send_empty(Method::Post, "/api/v1/auth/logout/", None).await
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> ClientResult<()> {
        let body = json!({
            "old_password": old_password,
            "new_password": new_password,
        });
        self.client
            .send_empty(Method::Post, "/api/v1/auth/password/change/", Some(body))
            .await
    }

    pub async fn request_password_reset(&self, email: &str) -> ClientResult<()> {
        self.client
            .send_anonymous_empty(Method::Post, "/api/v1/auth/password/reset/", Some(json!({ "email": email })))
            .await
    }
}
