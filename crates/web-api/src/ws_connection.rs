use application::{Identity, Outbox};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::{
    ClientEvent, ConnectionId, DomainError, EncryptedContent, OutgoingMessage, ServerEvent,
    Username,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::{error::ApiError, state::AppState};

/// 单个已认证 WebSocket 连接
///
/// 出站事件统一经过连接自己的 outbox，由发送任务写入 socket；
/// 接收任务把客户端事件翻译成在线状态中心的操作，失败只回报给本连接。
pub struct WebSocketConnection {
    state: AppState,
    identity: Identity,
}

impl WebSocketConnection {
    pub fn new(state: AppState, identity: Identity) -> Self {
        Self { state, identity }
    }

    pub async fn run(self, socket: WebSocket) {
        let (outbox, mut events) = mpsc::unbounded_channel::<ServerEvent>();
        let connection_id = self
            .state
            .hub
            .connect(self.identity.clone(), outbox.clone())
            .await;
        let username = self.identity.username.clone();

        let (mut sender, mut incoming) = socket.split();

        // 发送任务：唯一写 socket 的地方
        let mut send_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let payload = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to serialize websocket payload");
                        continue;
                    }
                };
                if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            tracing::debug!("websocket send task finished");
        });

        // 接收任务：处理来自客户端的帧
        let mut recv_task = {
            let state = self.state.clone();
            let identity = self.identity.clone();
            tokio::spawn(async move {
                while let Some(Ok(frame)) = incoming.next().await {
                    let event = match frame {
                        WsMessage::Text(text) => serde_json::from_str::<ClientEvent>(text.as_str()),
                        WsMessage::Close(_) => {
                            tracing::debug!("websocket close frame received");
                            break;
                        }
                        WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                        WsMessage::Binary(_) => {
                            report(&outbox, ApiError::bad_frame("binary frames are not supported"));
                            continue;
                        }
                    };

                    match event {
                        Ok(event) => {
                            if let Err(err) = dispatch(&state, connection_id, &identity, event).await {
                                report(&outbox, err.into());
                            }
                        }
                        Err(err) => report(&outbox, ApiError::bad_frame(err.to_string())),
                    }
                }
                tracing::debug!("websocket receive task finished");
            })
        };

        // 任意一侧结束即视为断开
        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        self.state.hub.disconnect(connection_id).await;
        tracing::info!(
            connection_id = %connection_id,
            username = %username,
            "websocket disconnected"
        );
    }
}

async fn dispatch(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    event: ClientEvent,
) -> Result<(), DomainError> {
    let hub = &state.hub;
    match event {
        ClientEvent::JoinRoom(target) => hub.join(connection_id, target.room_id).await,
        ClientEvent::LeaveRoom(target) => {
            hub.leave(connection_id, target.room_id).await;
            Ok(())
        }
        ClientEvent::SendMessage(OutgoingMessage {
            room_id,
            sender,
            encrypted_content,
            message_type,
        }) => {
            let sender = match sender {
                Some(claimed) => Username::parse(claimed).map_err(|_| DomainError::Forbidden)?,
                None => identity.username.clone(),
            };
            let content = EncryptedContent::new(encrypted_content)?;
            hub.publish(connection_id, room_id, &sender, content, message_type)
                .await
                .map(|_| ())
        }
        ClientEvent::Typing(target) => hub.set_typing(connection_id, target.room_id, true).await,
        ClientEvent::StopTyping(target) => {
            hub.set_typing(connection_id, target.room_id, false).await
        }
    }
}

fn report(outbox: &Outbox, error: ApiError) {
    tracing::debug!(code = error.code(), "reporting websocket error");
    // 发送失败说明连接已经在关闭
    let _ = outbox.send(error.into_event());
}
