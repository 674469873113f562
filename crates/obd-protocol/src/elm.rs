//! ELM327 request framing and reply parsing
//!
//! The adapter answers every command with one or more `\r` separated lines
//! followed by the `>` prompt. Echo may or may not be enabled, spaces may or
//! may not separate the hex bytes; the parsers accept both.

use crate::error::ObdError;
use crate::mode;
use crate::pid::Pid;

/// The prompt that terminates every ELM327 reply
pub const PROMPT: u8 = b'>';

/// Read the control module voltage
pub const READ_VOLTAGE: &str = "ATRV";

/// Format a Mode 01 request for a PID, without the trailing carriage return
pub fn pid_command(pid: Pid) -> String {
    format!("{:02X}{:02X}", mode::CURRENT_DATA, pid.as_hex())
}

/// Split a raw reply into trimmed lines, dropping the prompt, blank lines,
/// protocol search chatter and the echoed command.
pub fn reply_lines(command: &str, raw: &str) -> Result<Vec<String>, ObdError> {
    let mut lines: Vec<String> = raw
        .split(['\r', '\n'])
        .map(|line| line.trim_matches(|c: char| c == '>' || c.is_whitespace()))
        .filter(|line| !line.is_empty() && !line.starts_with("SEARCHING"))
        .map(str::to_string)
        .collect();

    if let Some(first) = lines.first() {
        if looks_like_echo(first) {
            if compact(first) != compact(command) {
                return Err(ObdError::EchoMismatch {
                    sent: command.to_string(),
                    received: first.clone(),
                });
            }
            lines.remove(0);
        }
    }

    if let Some(error) = lines.iter().find_map(|line| classify_error(line)) {
        return Err(error);
    }
    Ok(lines)
}

/// Parse the data bytes of a Mode 01 reply for `pid`.
///
/// The first line carrying `41 <pid>` wins when several ECUs answer. The
/// returned payload holds exactly `pid.response_bytes()` bytes.
pub fn parse_pid_reply(pid: Pid, raw: &str) -> Result<Vec<u8>, ObdError> {
    let command = pid_command(pid);
    let lines = reply_lines(&command, raw)?;
    let prefix = format!("{:02X}{:02X}", mode::CURRENT_DATA + 0x40, pid.as_hex());

    let data = lines
        .iter()
        .map(|line| compact(line))
        .find_map(|line| line.strip_prefix(&prefix).map(str::to_string))
        .ok_or_else(|| {
            ObdError::InvalidResponse(format!("no {} reply in {:?}", prefix, lines.join(" ")))
        })?;

    let mut bytes = decode_hex(&data)?;
    if bytes.len() < pid.response_bytes() {
        return Err(ObdError::InvalidResponse(format!(
            "PID {} reply carries {} byte(s), expected {}",
            pid,
            bytes.len(),
            pid.response_bytes()
        )));
    }
    bytes.truncate(pid.response_bytes());
    Ok(bytes)
}

/// Parse an `ATRV` reply such as `12.6V`
pub fn parse_voltage_reply(raw: &str) -> Result<f64, ObdError> {
    let lines = reply_lines(READ_VOLTAGE, raw)?;
    lines
        .iter()
        .find_map(|line| {
            line.strip_suffix(['V', 'v'])
                .and_then(|number| number.trim().parse::<f64>().ok())
        })
        .ok_or_else(|| ObdError::InvalidResponse(format!("no voltage in {:?}", lines.join(" "))))
}

/// Whether an AT setup command was acknowledged
pub fn is_acknowledged(command: &str, raw: &str) -> bool {
    match reply_lines(command, raw) {
        Ok(lines) => lines
            .iter()
            .any(|line| line == "OK" || line.starts_with("ELM327")),
        Err(_) => false,
    }
}

fn looks_like_echo(line: &str) -> bool {
    let line = compact(line);
    line.starts_with("AT") || line.starts_with("01")
}

fn classify_error(line: &str) -> Option<ObdError> {
    let upper = line.to_ascii_uppercase();
    if upper.contains("NO DATA") {
        Some(ObdError::NoData)
    } else if upper == "?" || upper.contains("STOPPED") {
        Some(ObdError::InvalidResponse(line.to_string()))
    } else if upper.contains("UNABLE TO CONNECT")
        || upper.contains("BUS INIT")
        || upper.contains("CAN ERROR")
        || upper.contains("BUS ERROR")
        || upper.contains("BUFFER FULL")
    {
        Some(ObdError::CanBusError(line.to_string()))
    } else {
        None
    }
}

fn compact(line: &str) -> String {
    line.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn decode_hex(data: &str) -> Result<Vec<u8>, ObdError> {
    if data.len() % 2 != 0 {
        return Err(ObdError::InvalidResponse(format!("odd hex length: {data}")));
    }
    (0..data.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&data[i..i + 2], 16)
                .map_err(|_| ObdError::InvalidResponse(format!("bad hex byte in {data}")))
        })
        .collect()
}
