// ============================================
// File: crates/burrow-transport/src/tun/linux.rs
// ============================================
//! # Linux TUN Device
//!
//! ## Creation Reason
//! The real virtual interface: a `/dev/net/tun` clone bound to one name,
//! addressed and brought up with `ip`.
//!
//! ## Lifecycle
//! ```text
//! create()  open /dev/net/tun (O_NONBLOCK) ─► TUNSETIFF (IFF_TUN|IFF_NO_PI)
//! up()      ip addr replace <addr>/24 ─► ip link set mtu ─► ip link set up
//! down()    ip link set down
//! drop      fd closed ─► kernel deletes the device and its routes
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Needs CAP_NET_ADMIN for both the ioctl and the `ip` calls
//! - IFF_NO_PI is required: the relay expects bare IP packets
//! - The device is not persistent; do not add TUNSETPERSIST without also
//!   deleting the link in `down()`
//!
//! ## Last Modified
//! v0.1.0 - Initial Linux TUN implementation

#![cfg(target_os = "linux")]

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::net::Ipv4Addr;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use nix::libc;
use tokio::io::unix::AsyncFd;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{TunConfig, TunDevice, TunProvider};

const CLONE_DEVICE: &str = "/dev/net/tun";

const IFF_TUN: libc::c_short = 0x0001;
const IFF_NO_PI: libc::c_short = 0x1000;

/// `_IOW('T', 202, int)`
const TUNSETIFF: libc::c_ulong = 0x4004_54ca;

/// `struct ifreq` as far as TUNSETIFF reads it.
#[repr(C)]
struct InterfaceRequest {
    name: [u8; libc::IFNAMSIZ],
    flags: libc::c_short,
    _union_rest: [u8; 22],
}

mod ioctl {
    nix::ioctl_readwrite_bad!(tun_set_iff, super::TUNSETIFF, super::InterfaceRequest);
}

impl InterfaceRequest {
    /// `None` if `name` does not fit with its NUL terminator.
    fn tun(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.len() >= libc::IFNAMSIZ {
            return None;
        }
        let mut request = Self {
            name: [0; libc::IFNAMSIZ],
            flags: IFF_TUN | IFF_NO_PI,
            _union_rest: [0; 22],
        };
        request.name[..bytes.len()].copy_from_slice(bytes);
        Some(request)
    }

    /// Name as the kernel filled it in.
    fn granted_name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }
}

// ============================================
// LinuxTun
// ============================================

/// `/dev/net/tun` device.
///
/// ```ignore
/// let config = TunConfig::new("tun0").with_address(Ipv4Addr::new(10, 8, 0, 7));
/// let tun = LinuxTun::create(config)?;
/// tun.up().await?;
/// let len = tun.read(&mut buf).await?;
/// ```
pub struct LinuxTun {
    fd: AsyncFd<File>,
    config: TunConfig,
    up: AtomicBool,
}

impl LinuxTun {
    /// Opens the clone device and binds it to `config.name`.
    ///
    /// # Errors
    /// `InvalidConfig` for a bad config, `PermissionDenied` without
    /// CAP_NET_ADMIN, `TunCreateFailed` otherwise.
    pub fn create(mut config: TunConfig) -> Result<Self> {
        config.validate()?;

        let mut request = InterfaceRequest::tun(&config.name)
            .ok_or_else(|| TransportError::invalid_config("name", "longer than IFNAMSIZ"))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(CLONE_DEVICE)
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => TransportError::PermissionDenied {
                    operation: format!("open {CLONE_DEVICE}"),
                },
                _ => TransportError::tun_create_failed(&config.name, e.to_string()),
            })?;

        // SAFETY: `request` is a live, correctly laid out ifreq prefix and
        // the fd stays open for the duration of the call.
        unsafe { ioctl::tun_set_iff(file.as_raw_fd(), &mut request) }.map_err(|errno| {
            TransportError::tun_create_failed(&config.name, format!("TUNSETIFF: {errno}"))
        })?;

        config.name = request.granted_name();
        let fd = AsyncFd::new(file)
            .map_err(|e| TransportError::tun_create_failed(&config.name, e.to_string()))?;

        info!(device = %config.name, "TUN device opened");
        Ok(Self {
            fd,
            config,
            up: AtomicBool::new(false),
        })
    }

    async fn ip(&self, args: &[&str]) -> Result<()> {
        let line = format!("ip {}", args.join(" "));
        debug!("{}", line);

        let output = Command::new("ip").args(args).output().await.map_err(|e| {
            TransportError::tun_config_failed(&self.config.name, format!("{line}: {e}"))
        })?;
        if output.status.success() {
            return Ok(());
        }

        Err(TransportError::tun_config_failed(
            &self.config.name,
            format!("{line}: {}", String::from_utf8_lossy(&output.stderr).trim()),
        ))
    }
}

#[async_trait]
impl TunDevice for LinuxTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let read_failed = |e: io::Error| TransportError::TunReadFailed {
            reason: e.to_string(),
        };
        loop {
            let mut ready = self.fd.readable().await.map_err(read_failed)?;
            match ready.try_io(|fd| {
                let mut file: &File = fd.get_ref();
                file.read(&mut *buf)
            }) {
                Ok(result) => return result.map_err(read_failed),
                Err(_would_block) => continue,
            }
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        let write_failed = |e: io::Error| TransportError::TunWriteFailed {
            reason: e.to_string(),
        };
        loop {
            let mut ready = self.fd.writable().await.map_err(write_failed)?;
            match ready.try_io(|fd| {
                let mut file: &File = fd.get_ref();
                file.write(buf)
            }) {
                Ok(result) => return result.map_err(write_failed),
                Err(_would_block) => continue,
            }
        }
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn mtu(&self) -> u16 {
        self.config.mtu
    }

    fn ip_addr(&self) -> Ipv4Addr {
        self.config.address
    }

    async fn up(&self) -> Result<()> {
        let name = self.config.name.as_str();
        let cidr = self.config.cidr();
        let mtu = self.config.mtu.to_string();

        self.ip(&["addr", "replace", &cidr, "dev", name]).await?;
        self.ip(&["link", "set", "dev", name, "mtu", &mtu]).await?;
        self.ip(&["link", "set", "dev", name, "up"]).await?;

        self.up.store(true, Ordering::Release);
        info!(device = name, address = %cidr, mtu = self.config.mtu, "TUN device up");
        Ok(())
    }

    async fn down(&self) -> Result<()> {
        if !self.up.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        // A device that already vanished is as down as it gets
        if let Err(e) = self.ip(&["link", "set", "dev", &self.config.name, "down"]).await {
            warn!("{}", e);
        }
        info!(device = %self.config.name, "TUN device down");
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LinuxTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxTun")
            .field("config", &self.config)
            .field("up", &self.is_up())
            .finish()
    }
}

// ============================================
// LinuxTunProvider
// ============================================

/// Opens a [`LinuxTun`] per session.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxTunProvider;

#[async_trait]
impl TunProvider for LinuxTunProvider {
    async fn create(&self, config: TunConfig) -> Result<Arc<dyn TunDevice>> {
        Ok(Arc::new(LinuxTun::create(config)?))
    }
}
