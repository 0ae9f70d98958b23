use std::{net::SocketAddr, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

use crate::api::master::{ModbusMaster, Operation, Output, TcpLink, DEFAULT_TARGET};

const OPERATIONS: [&str; 8] = [
    "read-coils",
    "read-discrete-inputs",
    "read-holding",
    "read-input",
    "write-coil",
    "write-register",
    "write-coils",
    "write-registers",
];

pub fn master_command() -> Command {
    Command::new("master")
        .about("Send a single request to a Modbus TCP slave")
        .arg(
            Arg::new("target")
                .long("target")
                .short('t')
                .value_name("ADDR")
                .help("Slave address")
                .default_value(DEFAULT_TARGET)
                .value_parser(value_parser!(SocketAddr)),
        )
        .arg(
            Arg::new("unit-id")
                .long("unit-id")
                .short('u')
                .value_name("N")
                .default_value("1")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .short('r')
                .value_name("N")
                .help("Extra attempts after the first failure")
                .default_value("2")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MS")
                .help("Per-attempt timeout")
                .default_value("3000")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .short('j')
                .help("Print the result as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("operation")
                .required(true)
                .value_parser(OPERATIONS),
        )
        .arg(
            Arg::new("address")
                .required(true)
                .value_parser(parse_word),
        )
        .arg(
            Arg::new("values")
                .num_args(0..)
                .help("Count for reads (default 1), values for writes"),
        )
}

/// Decimal or `0x`-prefixed hexadecimal 16-bit value.
fn parse_word(text: &str) -> Result<u16, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse::<u16>(),
    };
    parsed.map_err(|err| format!("`{text}` is not a 16-bit value: {err}"))
}

fn parse_bit(text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => bail!("`{text}` is not a coil value (expected 1/0, true/false or on/off)"),
    }
}

fn count_arg(name: &str, rest: &[String]) -> Result<u16> {
    match rest {
        [] => Ok(1),
        [count] => parse_word(count).map_err(|err| anyhow!(err)),
        _ => bail!("{name} takes at most one count argument"),
    }
}

fn single_arg<'a>(name: &str, rest: &'a [String]) -> Result<&'a str> {
    match rest {
        [value] => Ok(value.as_str()),
        _ => bail!("{name} takes exactly one value"),
    }
}

fn many_args<'a>(name: &str, rest: &'a [String]) -> Result<&'a [String]> {
    if rest.is_empty() {
        bail!("{name} needs at least one value");
    }
    Ok(rest)
}

/// Build an [`Operation`] from the positional command line arguments.
pub fn parse_operation(name: &str, address: u16, rest: &[String]) -> Result<Operation> {
    let count = || count_arg(name, rest);
    let single = || single_arg(name, rest);
    let many = || many_args(name, rest);

    let op = match name {
        "read-coils" => Operation::ReadCoils {
            address,
            count: count()?,
        },
        "read-discrete-inputs" => Operation::ReadDiscreteInputs {
            address,
            count: count()?,
        },
        "read-holding" => Operation::ReadHoldingRegisters {
            address,
            count: count()?,
        },
        "read-input" => Operation::ReadInputRegisters {
            address,
            count: count()?,
        },
        "write-coil" => Operation::WriteSingleCoil {
            address,
            value: parse_bit(single()?)?,
        },
        "write-register" => Operation::WriteSingleRegister {
            address,
            value: parse_word(single()?).map_err(|err| anyhow!(err))?,
        },
        "write-coils" => Operation::WriteMultipleCoils {
            address,
            values: many()?
                .iter()
                .map(|v| parse_bit(v))
                .collect::<Result<_>>()?,
        },
        "write-registers" => Operation::WriteMultipleRegisters {
            address,
            values: many()?
                .iter()
                .map(|v| parse_word(v).map_err(|err| anyhow!(err)))
                .collect::<Result<_>>()?,
        },
        other => bail!("unknown operation `{other}`"),
    };
    Ok(op)
}

/// Human-readable or JSON rendering of a finished operation.
pub fn render(op: &Operation, output: &Output, json: bool) -> Result<String> {
    if json {
        let value = serde_json::json!({
            "operation": op.name(),
            "address": op.address(),
            "result": output,
        });
        return serde_json::to_string(&value).context("failed to encode result");
    }

    let start = op.address();
    let lines: Vec<String> = match output {
        Output::Bits(values) => (usize::from(start)..)
            .zip(values)
            .map(|(address, value)| format!("{address}: {}", u8::from(*value)))
            .collect(),
        Output::Words(values) => (usize::from(start)..)
            .zip(values)
            .map(|(address, value)| format!("{address}: {value} (0x{value:04X})"))
            .collect(),
        Output::Written => vec![format!("{} at {start}: ok", op.name())],
    };
    Ok(lines.join("\n"))
}

pub async fn run_master(matches: &ArgMatches) -> Result<()> {
    let target = *matches
        .get_one::<SocketAddr>("target")
        .ok_or_else(|| anyhow!("missing --target"))?;
    let unit_id = *matches
        .get_one::<u8>("unit-id")
        .ok_or_else(|| anyhow!("missing --unit-id"))?;
    let retries = *matches
        .get_one::<usize>("retries")
        .ok_or_else(|| anyhow!("missing --retries"))?;
    let timeout = Duration::from_millis(
        *matches
            .get_one::<u64>("timeout-ms")
            .ok_or_else(|| anyhow!("missing --timeout-ms"))?,
    );
    let name = matches
        .get_one::<String>("operation")
        .ok_or_else(|| anyhow!("missing operation"))?;
    let address = *matches
        .get_one::<u16>("address")
        .ok_or_else(|| anyhow!("missing address"))?;
    let rest: Vec<String> = matches
        .get_many::<String>("values")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let op = parse_operation(name, address, &rest)?;
    let mut master =
        ModbusMaster::with_retries(TcpLink::new(target, unit_id, timeout), retries);
    let output = master.execute(op.clone()).await?;

    println!("{}", render(&op, &output, matches.get_flag("json"))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::master::DEFAULT_RETRIES;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_reads_default_to_one() {
        assert_eq!(
            parse_operation("read-holding", 40, &[]).unwrap(),
            Operation::ReadHoldingRegisters {
                address: 40,
                count: 1
            }
        );
        assert_eq!(
            parse_operation("read-coils", 0, &args(&["0x10"])).unwrap(),
            Operation::ReadCoils {
                address: 0,
                count: 16
            }
        );
    }

    #[test]
    fn test_parse_writes() {
        assert_eq!(
            parse_operation("write-coils", 3, &args(&["1", "off", "true"])).unwrap(),
            Operation::WriteMultipleCoils {
                address: 3,
                values: vec![true, false, true]
            }
        );
        assert!(parse_operation("write-register", 3, &args(&["1", "2"])).is_err());
        assert!(parse_operation("write-registers", 3, &[]).is_err());
        assert!(parse_operation("write-coil", 3, &args(&["maybe"])).is_err());
    }

    #[test]
    fn test_render() {
        let op = Operation::ReadHoldingRegisters {
            address: 10,
            count: 2,
        };
        let output = Output::Words(vec![1, 255]);

        assert_eq!(
            render(&op, &output, false).unwrap(),
            "10: 1 (0x0001)\n11: 255 (0x00FF)"
        );
        assert_eq!(
            render(&op, &output, true).unwrap(),
            r#"{"address":10,"operation":"read holding registers","result":{"words":[1,255]}}"#
        );
    }

    #[test]
    fn test_command_line_parses() {
        let matches = master_command()
            .try_get_matches_from(["master", "--json", "write-registers", "0x0A", "1", "2"])
            .unwrap();
        assert_eq!(matches.get_one::<u16>("address"), Some(&10));
        assert_eq!(matches.get_many::<String>("values").unwrap().count(), 2);
        assert_eq!(matches.get_one::<usize>("retries"), Some(&DEFAULT_RETRIES));
    }
}
