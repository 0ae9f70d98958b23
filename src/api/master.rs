use std::{net::SocketAddr, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio_modbus::{client, prelude::*};

pub const DEFAULT_RETRIES: usize = 2;
pub const DEFAULT_TARGET: &str = "127.0.0.1:5502";

/// A single master-side request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ReadCoils { address: u16, count: u16 },
    ReadDiscreteInputs { address: u16, count: u16 },
    ReadHoldingRegisters { address: u16, count: u16 },
    ReadInputRegisters { address: u16, count: u16 },
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleCoils { address: u16, values: Vec<bool> },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadCoils { .. } => "read coils",
            Self::ReadDiscreteInputs { .. } => "read discrete inputs",
            Self::ReadHoldingRegisters { .. } => "read holding registers",
            Self::ReadInputRegisters { .. } => "read input registers",
            Self::WriteSingleCoil { .. } => "write single coil",
            Self::WriteSingleRegister { .. } => "write single register",
            Self::WriteMultipleCoils { .. } => "write multiple coils",
            Self::WriteMultipleRegisters { .. } => "write multiple registers",
        }
    }

    pub fn address(&self) -> u16 {
        match self {
            Self::ReadCoils { address, .. }
            | Self::ReadDiscreteInputs { address, .. }
            | Self::ReadHoldingRegisters { address, .. }
            | Self::ReadInputRegisters { address, .. }
            | Self::WriteSingleCoil { address, .. }
            | Self::WriteSingleRegister { address, .. }
            | Self::WriteMultipleCoils { address, .. }
            | Self::WriteMultipleRegisters { address, .. } => *address,
        }
    }
}

/// What a successful operation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    Bits(Vec<bool>),
    Words(Vec<u16>),
    Written,
}

/// Connection to one slave. Exception responses surface as errors.
#[async_trait]
pub trait MasterLink: Send {
    async fn execute(&mut self, op: &Operation) -> Result<Output>;

    /// Drop the current connection and open a fresh one.
    async fn reconnect(&mut self) -> Result<()>;
}

/// [`MasterLink`] over Modbus TCP. Connects lazily on first use.
pub struct TcpLink {
    target: SocketAddr,
    unit_id: u8,
    timeout: Duration,
    ctx: Option<client::Context>,
}

impl TcpLink {
    pub fn new(target: SocketAddr, unit_id: u8, timeout: Duration) -> Self {
        Self {
            target,
            unit_id,
            timeout,
            ctx: None,
        }
    }

    async fn context(&mut self) -> Result<&mut client::Context> {
        if self.ctx.is_none() {
            let connect = tcp::connect_slave(self.target, Slave(self.unit_id));
            let ctx = tokio::time::timeout(self.timeout, connect)
                .await
                .map_err(|_| anyhow!("connecting to {} timed out", self.target))?
                .with_context(|| format!("failed to connect to {}", self.target))?;
            log::debug!("connected to {} as unit {}", self.target, self.unit_id);
            self.ctx = Some(ctx);
        }
        self.ctx
            .as_mut()
            .ok_or_else(|| anyhow!("no connection to {}", self.target))
    }
}

#[async_trait]
impl MasterLink for TcpLink {
    async fn execute(&mut self, op: &Operation) -> Result<Output> {
        let timeout = self.timeout;
        let ctx = self.context().await?;

        let call = async {
            let output = match op {
                Operation::ReadCoils { address, count } => {
                    Output::Bits(ctx.read_coils(*address, *count).await??)
                }
                Operation::ReadDiscreteInputs { address, count } => {
                    Output::Bits(ctx.read_discrete_inputs(*address, *count).await??)
                }
                Operation::ReadHoldingRegisters { address, count } => {
                    Output::Words(ctx.read_holding_registers(*address, *count).await??)
                }
                Operation::ReadInputRegisters { address, count } => {
                    Output::Words(ctx.read_input_registers(*address, *count).await??)
                }
                Operation::WriteSingleCoil { address, value } => {
                    ctx.write_single_coil(*address, *value).await??;
                    Output::Written
                }
                Operation::WriteSingleRegister { address, value } => {
                    ctx.write_single_register(*address, *value).await??;
                    Output::Written
                }
                Operation::WriteMultipleCoils { address, values } => {
                    ctx.write_multiple_coils(*address, values).await??;
                    Output::Written
                }
                Operation::WriteMultipleRegisters { address, values } => {
                    ctx.write_multiple_registers(*address, values).await??;
                    Output::Written
                }
            };
            Ok::<_, anyhow::Error>(output)
        };

        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| anyhow!("{} timed out after {timeout:?}", op.name()))?
    }

    async fn reconnect(&mut self) -> Result<()> {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(err) = ctx.disconnect().await {
                log::debug!("disconnect from {} failed: {err}", self.target);
            }
        }
        self.context().await.map(|_| ())
    }
}

/// Master role: each operation is tried up to `retries + 1` times, with a
/// reconnect between attempts.
pub struct ModbusMaster<L> {
    link: L,
    retries: usize,
}

impl<L: MasterLink> ModbusMaster<L> {
    pub fn new(link: L) -> Self {
        Self::with_retries(link, DEFAULT_RETRIES)
    }

    pub fn with_retries(link: L, retries: usize) -> Self {
        Self { link, retries }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Run `op`, returning the last error once every attempt has failed.
    pub async fn execute(&mut self, op: Operation) -> Result<Output> {
        let attempts = self.retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.link.execute(&op).await {
                Ok(output) => return Ok(output),
                Err(err) => {
                    log::warn!(
                        "{} at {} failed (attempt {attempt}/{attempts}): {err:#}",
                        op.name(),
                        op.address()
                    );
                    last_error = Some(err);
                }
            }
            if attempt < attempts {
                if let Err(err) = self.link.reconnect().await {
                    log::warn!("reconnect failed: {err:#}");
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("{} was never attempted", op.name()))
            .context(format!("{} failed after {attempts} attempts", op.name())))
    }

    pub async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>> {
        bits(self.execute(Operation::ReadCoils { address, count }).await?)
    }

    pub async fn read_discrete_inputs(&mut self, address: u16, count: u16) -> Result<Vec<bool>> {
        bits(
            self.execute(Operation::ReadDiscreteInputs { address, count })
                .await?,
        )
    }

    pub async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        words(
            self.execute(Operation::ReadHoldingRegisters { address, count })
                .await?,
        )
    }

    pub async fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        words(
            self.execute(Operation::ReadInputRegisters { address, count })
                .await?,
        )
    }

    pub async fn write_single_coil(&mut self, address: u16, value: bool) -> Result<()> {
        self.execute(Operation::WriteSingleCoil { address, value })
            .await
            .map(|_| ())
    }

    pub async fn write_single_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.execute(Operation::WriteSingleRegister { address, value })
            .await
            .map(|_| ())
    }

    pub async fn write_multiple_coils(&mut self, address: u16, values: &[bool]) -> Result<()> {
        self.execute(Operation::WriteMultipleCoils {
            address,
            values: values.to_vec(),
        })
        .await
        .map(|_| ())
    }

    pub async fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        self.execute(Operation::WriteMultipleRegisters {
            address,
            values: values.to_vec(),
        })
        .await
        .map(|_| ())
    }
}

fn bits(output: Output) -> Result<Vec<bool>> {
    match output {
        Output::Bits(values) => Ok(values),
        other => Err(anyhow!("expected bit values, got {other:?}")),
    }
}

fn words(output: Output) -> Result<Vec<u16>> {
    match output {
        Output::Words(values) => Ok(values),
        other => Err(anyhow!("expected register values, got {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails the first `failures` calls, then answers with fixed values.
    struct FlakyLink {
        failures: usize,
        calls: usize,
        reconnects: usize,
    }

    impl FlakyLink {
        fn failing(failures: usize) -> Self {
            Self {
                failures,
                calls: 0,
                reconnects: 0,
            }
        }
    }

    #[async_trait]
    impl MasterLink for FlakyLink {
        async fn execute(&mut self, op: &Operation) -> Result<Output> {
            self.calls += 1;
            if self.calls <= self.failures {
                return Err(anyhow!("link down (call {})", self.calls));
            }
            Ok(match op {
                Operation::ReadCoils { count, .. } => Output::Bits(vec![true; usize::from(*count)]),
                Operation::ReadHoldingRegisters { count, .. } => {
                    Output::Words(vec![7; usize::from(*count)])
                }
                _ => Output::Written,
            })
        }

        async fn reconnect(&mut self) -> Result<()> {
            self.reconnects += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() -> Result<()> {
        let mut master = ModbusMaster::new(FlakyLink::failing(0));

        assert_eq!(master.read_coils(0, 3).await?, vec![true, true, true]);
        assert_eq!(master.link().calls, 1);
        assert_eq!(master.link().reconnects, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_recovers_within_retry_budget() -> Result<()> {
        let mut master = ModbusMaster::new(FlakyLink::failing(2));

        assert_eq!(master.read_holding_registers(10, 2).await?, vec![7, 7]);
        assert_eq!(master.link().calls, 3);
        assert_eq!(master.link().reconnects, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let mut master = ModbusMaster::with_retries(FlakyLink::failing(10), 1);

        let err = master.write_single_coil(4, true).await.unwrap_err();
        assert!(format!("{err:#}").contains("call 2"));
        assert_eq!(master.link().calls, 2);
        assert_eq!(master.link().reconnects, 1);
    }

    #[test]
    fn test_zero_retries_makes_one_attempt() {
        let mut master = ModbusMaster::with_retries(FlakyLink::failing(1), 0);

        tokio_test::assert_err!(tokio_test::block_on(master.read_coils(0, 1)));
        assert_eq!(master.link().calls, 1);
        assert_eq!(master.link().reconnects, 0);
    }

    #[tokio::test]
    async fn test_output_shape_is_checked() {
        let mut master = ModbusMaster::new(FlakyLink::failing(0));
        assert!(master.read_input_registers(0, 1).await.is_err());
    }
}
