//! Command implementations

use std::io::Write;

use serline_client::{AddrProvider, ChannelHandler, ClientConfig, ConnectionManager, ReadEvent};
use serline_protocol::{DropInterleaved, Frame, FrameTransform, LineCodec};
use serline_utils::{Result, SerlineError};

use crate::cli::{Cli, Command};

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load(),
    };
    cli.line.apply(&mut config);

    let addr = config.resolve_addr(cli.addr.as_deref()).ok_or_else(|| {
        SerlineError::config("No device address; pass --addr or set addr in the config file")
    })?;
    tracing::debug!(addr = %addr, "Resolved device address");

    let provider = AddrProvider::new(addr.clone());
    let mut manager = ConnectionManager::from_config(Box::new(provider), &config);

    match cli.command {
        Command::Monitor {
            hex,
            strict,
            interleaved,
        } => {
            let style = FrameStyle {
                hex,
                strict,
                interleaved,
            };
            monitor(&mut manager, style).await
        }
        Command::Send { text, raw } => send(&mut manager, &text, raw).await,
        Command::Info => info(&mut manager, &addr).await,
    }
}

/// How `monitor` prints frames
#[derive(Debug, Clone, Copy)]
struct FrameStyle {
    hex: bool,
    strict: bool,
    interleaved: bool,
}

impl FrameStyle {
    fn render(&self, frame: Frame) -> Option<String> {
        if self.strict && !frame.is_terminated() {
            return None;
        }
        let frame = if self.interleaved {
            DropInterleaved.apply(frame)
        } else {
            frame
        };

        if self.hex {
            let bytes: Vec<String> = frame.iter().map(|b| format!("{:02x}", b)).collect();
            Some(bytes.join(" "))
        } else {
            Some(frame.to_text().into_owned())
        }
    }
}

async fn monitor(manager: &mut ConnectionManager, style: FrameStyle) -> Result<i32> {
    let info = manager.connect().await?;
    eprintln!("Connected to {}", info);

    let (handler, mut rx) = ChannelHandler::new();
    if let Err(e) = manager.start_reading(handler) {
        let _ = manager.disconnect().await;
        return Err(e);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut stdout = std::io::stdout();
    let mut exit_code = 0;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(ReadEvent::Frame(frame)) => {
                    if let Some(line) = style.render(frame) {
                        // Stdout closed (e.g. piped into head); stop quietly
                        if writeln!(stdout, "{}", line).is_err() {
                            break;
                        }
                    }
                }
                Some(ReadEvent::End) | None => {
                    eprintln!("Device closed the stream");
                    break;
                }
                Some(ReadEvent::Error { detail, .. }) => {
                    eprintln!("{}", detail);
                    exit_code = 1;
                    break;
                }
            },
            _ = &mut ctrl_c => {
                tracing::debug!("Interrupted");
                break;
            }
        }
    }

    manager.disconnect().await?;
    eprintln!("Disconnected from {}", info);
    Ok(exit_code)
}

async fn send(manager: &mut ConnectionManager, text: &str, raw: bool) -> Result<i32> {
    manager.connect().await?;

    let writer = manager.writer()?;
    let sent = if raw {
        writer.send_text(text).await
    } else {
        writer.send_encoded(&mut LineCodec::new(), text).await
    };

    // Disconnect even when the write failed; report the write error first
    let closed = manager.disconnect().await;
    sent?;
    closed?;
    Ok(0)
}

async fn info(manager: &mut ConnectionManager, addr: &str) -> Result<i32> {
    let options = manager.options().clone();
    println!("address:      {}", addr);
    println!("baud rate:    {}", options.baud_rate);
    println!("data bits:    {}", u8::from(options.data_bits));
    println!("parity:       {:?}", options.parity);
    println!("stop bits:    {}", u8::from(options.stop_bits));
    println!("flow control: {:?}", options.flow_control);
    println!("buffer size:  {}", options.buffer_size);
    for filter in manager.filters() {
        println!("filter:       {:?}", filter);
    }

    let port = manager.connect().await?;
    println!("port:         {}", port);
    manager.disconnect().await?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> FrameStyle {
        FrameStyle {
            hex: false,
            strict: false,
            interleaved: false,
        }
    }

    #[test]
    fn test_render_text() {
        let line = style().render(Frame::new(&b"temp=21"[..]));
        assert_eq!(line.as_deref(), Some("temp=21"));
    }

    #[test]
    fn test_render_hex() {
        let hex = FrameStyle {
            hex: true,
            ..style()
        };
        assert_eq!(
            hex.render(Frame::new(vec![0x01u8, 0xab])).as_deref(),
            Some("01 ab")
        );
    }

    #[test]
    fn test_render_strict_skips_trailing() {
        let strict = FrameStyle {
            strict: true,
            ..style()
        };
        assert_eq!(strict.render(Frame::unterminated(&b"part"[..])), None);
        assert!(strict.render(Frame::new(&b"whole"[..])).is_some());
    }

    #[test]
    fn test_render_interleaved() {
        let interleaved = FrameStyle {
            interleaved: true,
            ..style()
        };
        let line = interleaved.render(Frame::new(vec![b'o', 0, b'k', 0]));
        assert_eq!(line.as_deref(), Some("ok"));
    }
}
