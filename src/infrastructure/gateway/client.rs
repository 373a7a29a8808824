// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::settings::GatewaySettings;
use crate::domain::models::identity::SendingIdentity;
use crate::domain::models::worker_config::MessageKind;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 提供方未上报令牌有效期，客户端按固定有效期自行计时
const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// 网关错误类型
#[derive(Error, Debug)]
pub enum GatewayError {
    /// 传输层错误（网络、超时、解析）
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 认证失败
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 非预期的HTTP状态
    #[error("Unexpected gateway status: {0}")]
    UnexpectedStatus(StatusCode),
}

/// 发送结果
///
/// `accepted`是提供方自己上报的成功标志，和传输层错误是
/// 两种不同的失败模式，都原样暴露给调用方。
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// 提供方是否接受了这条消息
    pub accepted: bool,
    /// 提供方返回的说明文本
    pub provider_message: String,
}

/// 发送网关特质
///
/// 把外部消息提供方的HTTP API抽象为三个操作，隐藏令牌生命周期
/// 与身份发现。Worker只依赖这个接口。
#[async_trait]
pub trait SendingGateway: Send + Sync {
    /// 确保持有有效的访问令牌
    ///
    /// 令牌缺失或进入过期边际时先尝试refresh，刷新失败回退到
    /// 完整登录。可以在每次发送前安全调用。
    async fn ensure_authenticated(&self) -> Result<(), GatewayError>;

    /// 列出路由组内可用的发送身份
    ///
    /// 结果按路由组做短TTL缓存；拉取失败时若存在（可能过期的）
    /// 缓存则降级返回缓存，否则把错误原样传播——调用方绝不把
    /// "没有身份"静默当作成功。
    async fn list_identities(
        &self,
        routing_group: &str,
    ) -> Result<Vec<SendingIdentity>, GatewayError>;

    /// 通过指定身份投递一条消息
    async fn dispatch(
        &self,
        identity: &SendingIdentity,
        destination: &str,
        payload: &str,
        kind: MessageKind,
    ) -> Result<DispatchOutcome, GatewayError>;
}

/// 客户端持有的令牌状态
#[derive(Default)]
struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<Instant>,
}

/// 路由组的身份缓存条目
#[derive(Clone)]
struct CachedIdentities {
    fetched_at: Instant,
    identities: Vec<SendingIdentity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDto {
    id: String,
    handle: String,
    available: bool,
    routing_group: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DirectSendRequest<'a> {
    to: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupSendRequest<'a> {
    group_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    accepted: bool,
    #[serde(default)]
    provider_message: String,
}

/// 发送网关HTTP客户端实现
pub struct HttpGatewayClient {
    /// HTTP客户端
    client: Client,
    /// 网关API基础URL
    base_url: String,
    /// 登录用户名
    username: String,
    /// 登录密码
    password: String,
    /// 令牌过期安全边际
    expiry_margin: Duration,
    /// 令牌状态
    token: RwLock<TokenState>,
    /// 按路由组缓存的发送身份，进程内所有Worker共享只读
    identity_cache: DashMap<String, CachedIdentities>,
    /// 身份缓存TTL
    cache_ttl: Duration,
}

impl HttpGatewayClient {
    /// 创建新的网关客户端实例
    ///
    /// # 参数
    ///
    /// * `settings` - 网关配置
    ///
    /// # 返回值
    ///
    /// * `Ok(HttpGatewayClient)` - 新的客户端实例
    /// * `Err(GatewayError)` - HTTP客户端构建失败
    pub fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("Relayrs-Gateway/0.1.0"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.request_timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            expiry_margin: Duration::from_secs(settings.token_expiry_margin),
            token: RwLock::new(TokenState::default()),
            identity_cache: DashMap::new(),
            cache_ttl: Duration::from_secs(settings.identity_cache_ttl),
        })
    }

    /// 判断令牌状态是否仍在有效期内（含安全边际）
    fn token_is_fresh(&self, state: &TokenState) -> bool {
        match (&state.access_token, state.expires_at) {
            (Some(_), Some(expires_at)) => Instant::now() + self.expiry_margin < expires_at,
            _ => false,
        }
    }

    /// 完整登录，换取新的访问令牌和刷新令牌
    async fn login(&self) -> Result<LoginResponse, GatewayError> {
        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Auth(format!(
                "login rejected with status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// 用刷新令牌换取新的访问令牌
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, GatewayError> {
        let response = self
            .client
            .post(format!("{}/refresh", self.base_url))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Auth(format!(
                "refresh rejected with status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// 当前访问令牌的快照
    async fn access_token(&self) -> Result<String, GatewayError> {
        self.token
            .read()
            .await
            .access_token
            .clone()
            .ok_or_else(|| GatewayError::Auth("no access token held".to_string()))
    }

    /// 从远端拉取路由组的发送身份
    async fn fetch_identities(
        &self,
        routing_group: &str,
    ) -> Result<Vec<SendingIdentity>, GatewayError> {
        self.ensure_authenticated().await?;
        let token = self.access_token().await?;

        let response = self
            .client
            .get(format!("{}/identities", self.base_url))
            .query(&[("routingGroup", routing_group)])
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::UnexpectedStatus(response.status()));
        }

        let dtos: Vec<IdentityDto> = response.json().await?;

        // Only identities that are available and actually assigned to the
        // requested group are eligible, whatever the server returned.
        Ok(dtos
            .into_iter()
            .filter(|dto| dto.available && dto.routing_group == routing_group)
            .map(|dto| SendingIdentity {
                id: dto.id,
                handle: dto.handle,
                available: dto.available,
                routing_group: dto.routing_group,
            })
            .collect())
    }
}

#[async_trait]
impl SendingGateway for HttpGatewayClient {
    async fn ensure_authenticated(&self) -> Result<(), GatewayError> {
        {
            let state = self.token.read().await;
            if self.token_is_fresh(&state) {
                return Ok(());
            }
        }

        let mut state = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock
        if self.token_is_fresh(&state) {
            return Ok(());
        }

        if let Some(refresh_token) = state.refresh_token.clone() {
            match self.refresh(&refresh_token).await {
                Ok(refreshed) => {
                    debug!("Gateway access token refreshed");
                    state.access_token = Some(refreshed.access_token);
                    state.expires_at = Some(Instant::now() + ACCESS_TOKEN_TTL);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Token refresh failed, falling back to full login: {}", e);
                }
            }
        }

        let login = self.login().await?;
        info!("Gateway login succeeded");
        state.access_token = Some(login.access_token);
        state.refresh_token = Some(login.refresh_token);
        state.expires_at = Some(Instant::now() + ACCESS_TOKEN_TTL);
        Ok(())
    }

    async fn list_identities(
        &self,
        routing_group: &str,
    ) -> Result<Vec<SendingIdentity>, GatewayError> {
        let cached = self
            .identity_cache
            .get(routing_group)
            .map(|entry| entry.clone());

        if let Some(ref entry) = cached {
            if entry.fetched_at.elapsed() < self.cache_ttl {
                return Ok(entry.identities.clone());
            }
        }

        match self.fetch_identities(routing_group).await {
            Ok(identities) => {
                self.identity_cache.insert(
                    routing_group.to_string(),
                    CachedIdentities {
                        fetched_at: Instant::now(),
                        identities: identities.clone(),
                    },
                );
                Ok(identities)
            }
            Err(e) => {
                // Serve a stale entry rather than stalling every worker in
                // the routing group; without one the error propagates.
                if let Some(entry) = cached {
                    warn!(
                        "Identity fetch for routing group {} failed, serving stale cache: {}",
                        routing_group, e
                    );
                    Ok(entry.identities)
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn dispatch(
        &self,
        identity: &SendingIdentity,
        destination: &str,
        payload: &str,
        kind: MessageKind,
    ) -> Result<DispatchOutcome, GatewayError> {
        self.ensure_authenticated().await?;
        let token = self.access_token().await?;

        let request = match kind {
            MessageKind::Direct => self
                .client
                .post(format!("{}/send/direct/{}", self.base_url, identity.id))
                .json(&DirectSendRequest {
                    to: destination,
                    message: payload,
                }),
            MessageKind::Group => self
                .client
                .post(format!("{}/send/group/{}", self.base_url, identity.id))
                .json(&GroupSendRequest {
                    group_id: destination,
                    message: payload,
                }),
        };

        let response = request.bearer_auth(token).send().await?;

        if !response.status().is_success() {
            return Err(GatewayError::UnexpectedStatus(response.status()));
        }

        let body: SendResponse = response.json().await?;
        Ok(DispatchOutcome {
            accepted: body.accepted,
            provider_message: body.provider_message,
        })
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
