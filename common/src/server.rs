use std::{
    io::{Read, Write},
    net::TcpListener,
};

use log::{debug, info, warn};

use crate::{
    command::{request_line, Command},
    dispatch::{Controller, Outcome},
    error::{DecodeError, ServeError},
    peripherals::{LightStrip, TextDisplay},
    render::{http_response, render_page},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Accepted,
    Parsed,
    Dispatched,
    Rendered,
    Closed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Accepted => "accepted",
            Self::Parsed => "parsed",
            Self::Dispatched => "dispatched",
            Self::Rendered => "rendered",
            Self::Closed => "closed",
        }
    }
}

fn enter(phase: Phase) {
    debug!("connection {}", phase.as_str());
}

pub fn process_request<L, D>(
    controller: &mut Controller<L, D>,
    raw: &[u8],
) -> Result<String, DecodeError>
where
    L: LightStrip,
    D: TextDisplay,
{
    let request = std::str::from_utf8(raw)?;
    info!("request: {}", request_line(request));

    let command = Command::from_request(request);
    enter(Phase::Parsed);
    debug!("command: {}", command.kind());

    if let Outcome::PeripheralFault(err) = controller.apply(command) {
        debug!("responding despite peripheral fault: {err}");
    }
    enter(Phase::Dispatched);

    let response = http_response(&render_page(controller.state()));
    enter(Phase::Rendered);
    Ok(response)
}

/// Single bounded read. The stream closes on drop, response or not.
pub fn serve_connection<S, L, D>(
    mut stream: S,
    controller: &mut Controller<L, D>,
    read_buffer_bytes: usize,
) -> Result<(), ServeError>
where
    S: Read + Write,
    L: LightStrip,
    D: TextDisplay,
{
    enter(Phase::Accepted);
    let mut buffer = vec![0_u8; read_buffer_bytes];
    let len = stream.read(&mut buffer)?;

    let response = process_request(controller, &buffer[..len])?;
    stream.write_all(response.as_bytes())?;
    stream.flush()?;
    Ok(())
}

/// Accepts and serves connections forever. Per-connection failures are
/// logged and never end the loop.
pub fn run_blocking<L, D>(
    listener: &TcpListener,
    controller: &mut Controller<L, D>,
    read_buffer_bytes: usize,
) -> !
where
    L: LightStrip,
    D: TextDisplay,
{
    loop {
        enter(Phase::Idle);
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("accept failed: {err}");
                continue;
            }
        };
        info!("connection from {peer}");

        match serve_connection(stream, controller, read_buffer_bytes) {
            Ok(()) => {}
            Err(ServeError::Decode(err)) => warn!("closing {peer} without response: {err}"),
            Err(ServeError::Io(err)) => warn!("connection {peer} failed: {err}"),
        }
        enter(Phase::Closed);
    }
}
