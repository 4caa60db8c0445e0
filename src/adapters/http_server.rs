//! ESP-IDF HTTP server wiring for `/api` and `/ws`.
//!
//! Handlers run on the httpd task. They only translate between HTTP and
//! [`crate::api::handlers`]; state and commands cross over through the
//! shared [`ApiBridge`].

use std::sync::Arc;

use anyhow::anyhow;
use esp_idf_svc::http::server::ws::EspHttpWsConnection;
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::{Headers, Method};
use esp_idf_svc::io::{Read, Write};
use esp_idf_svc::sys::{EspError, ESP_ERR_INVALID_SIZE};
use esp_idf_svc::ws::FrameType;
use log::{info, warn};

use crate::api::handlers::{
    self, ApiResponse, WsInbound, CONTENT_TYPE_JSON, CORS_HEADERS, MAX_BODY_LEN,
};
use crate::api::{ApiBridge, ApiError};
use crate::config::SystemConfig;
use crate::events::{self, Event};

use super::ws_push::{EspWsChannel, WsClients};

/// Keeps the server (and its handlers) alive.
pub struct WebServer {
    _server: EspHttpServer<'static>,
}

pub fn start(
    config: &SystemConfig,
    bridge: Arc<ApiBridge>,
    clients: Arc<WsClients<EspWsChannel>>,
) -> anyhow::Result<WebServer> {
    // No LRU purge: the oldest socket is usually a push subscriber.
    let mut server = EspHttpServer::new(&Configuration {
        http_port: config.http_port,
        max_open_sockets: config.http_open_sockets(),
        lru_purge_enable: false,
        ..Default::default()
    })?;

    let b = bridge.clone();
    server.fn_handler::<anyhow::Error, _>("/api", Method::Get, move |req| {
        respond(req, &handlers::get_state(&b))
    })?;

    let b = bridge.clone();
    server.fn_handler::<anyhow::Error, _>("/api", Method::Post, move |mut req| {
        let len = req.content_len().unwrap_or(0) as usize;
        if len > MAX_BODY_LEN {
            warn!("API | POST rejected: {} byte body", len);
            return respond(req, &ApiResponse::error(ApiError::BodyTooLarge));
        }
        let mut body = vec![0u8; len];
        req.read_exact(&mut body)
            .map_err(|e| anyhow!("reading body: {:?}", e))?;
        let resp = handlers::post_state(&b, &body);
        if resp.is_success() {
            events::push_event(Event::ApiCommand);
        }
        respond(req, &resp)
    })?;

    server.fn_handler::<anyhow::Error, _>("/api", Method::Options, |req| {
        respond(req, &handlers::preflight())
    })?;

    let b = bridge;
    server.ws_handler("/ws", move |ws: &mut EspHttpWsConnection| -> Result<(), EspError> {
        if ws.is_new() {
            let sender = ws.create_detached_sender()?;
            let (registered, hello) = clients.admit(EspWsChannel::new(sender), || {
                handlers::state_json(&b.snapshot())
            });
            if registered.is_err() {
                warn!("WS | session {} gets no pushes (client limit)", ws.session());
            }
            ws.send(FrameType::Text(false), hello.as_bytes())?;
        } else if ws.is_closed() {
            info!("WS | session {} closed", ws.session());
        } else {
            let (_, len) = ws.recv(&mut [])?;
            match handlers::inbound_ws_frame(len) {
                WsInbound::Discard(0) => {}
                WsInbound::Discard(len) => {
                    let mut payload = vec![0u8; len];
                    ws.recv(&mut payload)?;
                }
                WsInbound::Close => {
                    warn!("WS | session {} sent {} bytes, closing", ws.session(), len);
                    ws.send(FrameType::Close, &[])?;
                    // An error return makes httpd drop the socket.
                    return Err(EspError::from_infallible::<{ ESP_ERR_INVALID_SIZE as i32 }>());
                }
            }
        }
        Ok(())
    })?;

    info!("HTTP: serving /api and /ws on port {}", config.http_port);
    Ok(WebServer { _server: server })
}

fn respond(req: Request<&mut EspHttpConnection<'_>>, resp: &ApiResponse) -> anyhow::Result<()> {
    let headers = [
        CONTENT_TYPE_JSON,
        CORS_HEADERS[0],
        CORS_HEADERS[1],
        CORS_HEADERS[2],
    ];
    let mut out = req.into_response(resp.status, Some(resp.reason()), &headers)?;
    out.write_all(resp.body.as_bytes())?;
    Ok(())
}
