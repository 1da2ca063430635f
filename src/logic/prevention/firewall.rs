//! Firewall Enforcement
//!
//! The controller decides and records blocks; a `Firewall` applies them at the
//! network layer. `NullFirewall` only records the decision. `CommandFirewall`
//! programs iptables (unix) or Windows Firewall via netsh.

use std::net::IpAddr;
use std::process::Command;

use crate::logic::error::{Error, Result};

const RULE_PREFIX: &str = "IDSGuard_Block_";

pub trait Firewall: Send + Sync {
    fn name(&self) -> &'static str;
    fn block(&self, ip: IpAddr) -> Result<()>;
    fn unblock(&self, ip: IpAddr) -> Result<()>;
}

/// Decision-only enforcement
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFirewall;

impl Firewall for NullFirewall {
    fn name(&self) -> &'static str {
        "null"
    }

    fn block(&self, ip: IpAddr) -> Result<()> {
        log::debug!("Block decision for {} recorded (no enforcement)", ip);
        Ok(())
    }

    fn unblock(&self, ip: IpAddr) -> Result<()> {
        log::debug!("Unblock decision for {} recorded (no enforcement)", ip);
        Ok(())
    }
}

/// Host firewall via system commands (requires elevated privileges)
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandFirewall;

impl CommandFirewall {
    fn rule_name(ip: IpAddr) -> String {
        format!("{}{}", RULE_PREFIX, ip)
    }

    #[cfg(not(windows))]
    fn block_args(ip: IpAddr) -> (&'static str, Vec<String>) {
        let bin = if ip.is_ipv6() { "ip6tables" } else { "iptables" };
        let args: [&str; 10] = [
            "-A",
            "INPUT",
            "-s",
            &ip.to_string(),
            "-j",
            "DROP",
            "-m",
            "comment",
            "--comment",
            &Self::rule_name(ip),
        ];
        (bin, args.iter().map(|a| a.to_string()).collect())
    }

    #[cfg(not(windows))]
    fn unblock_args(ip: IpAddr) -> (&'static str, Vec<String>) {
        let (bin, mut args) = Self::block_args(ip);
        args[0] = "-D".into();
        (bin, args)
    }

    #[cfg(windows)]
    fn block_args(ip: IpAddr) -> (&'static str, Vec<String>) {
        let args: [&str; 8] = [
            "advfirewall",
            "firewall",
            "add",
            "rule",
            &format!("name={}", Self::rule_name(ip)),
            "dir=in",
            "action=block",
            &format!("remoteip={}", ip),
        ];
        ("netsh", args.iter().map(|a| a.to_string()).collect())
    }

    #[cfg(windows)]
    fn unblock_args(ip: IpAddr) -> (&'static str, Vec<String>) {
        let args: [&str; 6] = [
            "advfirewall",
            "firewall",
            "delete",
            "rule",
            &format!("name={}", Self::rule_name(ip)),
            &format!("remoteip={}", ip),
        ];
        ("netsh", args.iter().map(|a| a.to_string()).collect())
    }

    fn run(ip: IpAddr, (bin, args): (&'static str, Vec<String>)) -> Result<()> {
        let output = Command::new(bin)
            .args(&args)
            .output()
            .map_err(|e| Error::Enforcement { ip, message: format!("{}: {}", bin, e) })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Enforcement {
                ip,
                message: format!(
                    "{} exited with {}: {}",
                    bin,
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

impl Firewall for CommandFirewall {
    fn name(&self) -> &'static str {
        "command"
    }

    fn block(&self, ip: IpAddr) -> Result<()> {
        Self::run(ip, Self::block_args(ip))
    }

    fn unblock(&self, ip: IpAddr) -> Result<()> {
        Self::run(ip, Self::unblock_args(ip))
    }
}
