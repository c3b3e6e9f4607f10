//! CLI argument parsing

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use serline_client::ClientConfig;
use serline_protocol::{DataBits, FlowControl, Parity, PortFilter, StopBits};

/// Serial line monitor
#[derive(Parser, Debug)]
#[command(name = "serline")]
#[command(about = "Read and write CRLF-framed lines on a serial device")]
#[command(version)]
pub struct Cli {
    /// Device address (tcp://host:port, unix://path, a socket path or a remote alias)
    ///
    /// Falls back to `addr` from the config file. Aliases are looked up in
    /// the `[remotes]` table.
    #[arg(long, env = "SERLINE_ADDR", global = true)]
    pub addr: Option<String>,

    /// Config file to use instead of ~/.config/serline/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also log to serline.log in the state directory
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(flatten)]
    pub line: LineArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the configured line options
#[derive(Args, Debug, Default)]
pub struct LineArgs {
    /// Baud rate
    #[arg(long, global = true)]
    pub baud_rate: Option<u32>,

    /// Data bits (7 or 8)
    #[arg(long, global = true, value_parser = parse_data_bits)]
    pub data_bits: Option<DataBits>,

    /// Parity (none, even, odd)
    #[arg(long, global = true, value_parser = parse_parity)]
    pub parity: Option<Parity>,

    /// Stop bits (1 or 2)
    #[arg(long, global = true, value_parser = parse_stop_bits)]
    pub stop_bits: Option<StopBits>,

    /// Flow control (none, hardware)
    #[arg(long, global = true, value_parser = parse_flow_control)]
    pub flow_control: Option<FlowControl>,

    /// Read buffer size in bytes
    #[arg(long, global = true)]
    pub buffer_size: Option<u32>,

    /// Only accept a port with this USB vendor id
    #[arg(long, global = true, requires = "usb_product_id")]
    pub usb_vendor_id: Option<u16>,

    /// Only accept a port with this USB product id
    #[arg(long, global = true, requires = "usb_vendor_id")]
    pub usb_product_id: Option<u16>,
}

impl LineArgs {
    /// Apply the given overrides on top of `config`
    pub fn apply(&self, config: &mut ClientConfig) {
        let line = &mut config.line;
        if let Some(baud_rate) = self.baud_rate {
            line.baud_rate = baud_rate;
        }
        if let Some(data_bits) = self.data_bits {
            line.data_bits = data_bits;
        }
        if let Some(parity) = self.parity {
            line.parity = parity;
        }
        if let Some(stop_bits) = self.stop_bits {
            line.stop_bits = stop_bits;
        }
        if let Some(flow_control) = self.flow_control {
            line.flow_control = flow_control;
        }
        if let Some(buffer_size) = self.buffer_size {
            line.buffer_size = buffer_size;
        }
        if let (Some(vendor), Some(product)) = (self.usb_vendor_id, self.usb_product_id) {
            config.filters = vec![PortFilter::new(vendor, product)];
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every received line until the device closes or Ctrl-C
    Monitor {
        /// Print payload bytes as hex instead of text
        #[arg(long)]
        hex: bool,

        /// Skip a trailing line that ended without a terminator
        #[arg(long)]
        strict: bool,

        /// Keep only every second byte of each line
        #[arg(long)]
        interleaved: bool,
    },

    /// Send one line to the device
    Send {
        /// Text to send
        text: String,

        /// Send the text as-is, without appending CRLF
        #[arg(long)]
        raw: bool,
    },

    /// Show the resolved address, line options and port details
    Info,
}

fn parse_data_bits(s: &str) -> Result<DataBits, String> {
    let bits: u8 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    DataBits::try_from(bits)
}

fn parse_stop_bits(s: &str) -> Result<StopBits, String> {
    let bits: u8 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    StopBits::try_from(bits)
}

fn parse_parity(s: &str) -> Result<Parity, String> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "even" => Ok(Parity::Even),
        "odd" => Ok(Parity::Odd),
        other => Err(format!("unknown parity '{}'", other)),
    }
}

fn parse_flow_control(s: &str) -> Result<FlowControl, String> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok(FlowControl::None),
        "hardware" | "rtscts" => Ok(FlowControl::Hardware),
        other => Err(format!("unknown flow control '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_monitor_with_overrides() {
        let cli = Cli::try_parse_from([
            "serline",
            "--addr",
            "tcp://127.0.0.1:4000",
            "monitor",
            "--baud-rate",
            "115200",
            "--parity",
            "even",
            "--hex",
        ])
        .unwrap();

        assert_eq!(cli.addr.as_deref(), Some("tcp://127.0.0.1:4000"));
        assert_eq!(cli.line.baud_rate, Some(115_200));
        assert_eq!(cli.line.parity, Some(Parity::Even));
        assert!(matches!(cli.command, Command::Monitor { hex: true, .. }));
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from(["serline", "send", "AT+GMR", "--raw"]).unwrap();
        match cli.command {
            Command::Send { text, raw } => {
                assert_eq!(text, "AT+GMR");
                assert!(raw);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_invalid_data_bits() {
        let result = Cli::try_parse_from(["serline", "--data-bits", "9", "info"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_usb_ids_must_come_together() {
        let result = Cli::try_parse_from(["serline", "--usb-vendor-id", "2389", "info"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let args = LineArgs {
            baud_rate: Some(57_600),
            stop_bits: Some(StopBits::Two),
            usb_vendor_id: Some(2389),
            usb_product_id: Some(28704),
            ..LineArgs::default()
        };
        let mut config = ClientConfig::default();
        args.apply(&mut config);

        assert_eq!(config.line.baud_rate, 57_600);
        assert_eq!(config.line.stop_bits, StopBits::Two);
        assert_eq!(config.line.data_bits, DataBits::Eight);
        assert_eq!(config.filters, vec![PortFilter::new(2389, 28704)]);
    }
}
