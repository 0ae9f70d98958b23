pub mod config;
pub mod master;
pub mod slave;

use clap::{ArgMatches, Command};

pub use config::SlaveConfig;

pub fn build_cli() -> Command {
    Command::new("mbsim")
        .about("Modbus TCP master/slave simulator")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(slave::slave_command())
        .subcommand(master::master_command())
}

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    build_cli().get_matches()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(build_cli().try_get_matches_from(["mbsim"]).is_err());
        let matches = build_cli()
            .try_get_matches_from(["mbsim", "slave", "--tui"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "slave");
        assert!(sub.get_flag("tui"));
    }
}
