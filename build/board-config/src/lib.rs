// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build-time board description for STM32H7 boards.
//!
//! A board is described by a TOML file: its pin table, which pins are the
//! LED and button, the console UART, USB port roles, and the tick source.
//! [`BoardConfig::load`] reads and checks it from a build script, and
//! [`BoardConfig::generate`] turns it into `const` items for the board
//! crate to `include!`.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use quote::{format_ident, quote, TokenStreamExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the board file.
pub const CONFIG_VAR: &str = "BOARD_CONFIG";

/// Board file used when [`CONFIG_VAR`] is unset, relative to the crate being
/// built.
pub const DEFAULT_BOARD: &str = "boards/nucleo-h743zi2.toml";

/// Number of pins per GPIO port.
const PINS_PER_PORT: u8 = 16;

/// NVIC priority levels implemented on the STM32H7.
const PRIORITY_LEVELS: u8 = 16;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BoardConfig {
    pub name: String,
    /// Pins configured at boot, applied in file order.
    #[serde(default)]
    pub pins: IndexMap<String, PinConfig>,
    /// Name of the LED pin, if the board has one.
    pub led: Option<String>,
    /// Name of the user button pin, if the board has one.
    pub button: Option<String>,
    pub uart: Option<UartConfig>,
    #[serde(default)]
    pub usb: UsbConfig,
    #[serde(default)]
    pub tick: TickConfig,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PinConfig {
    pub port: Port,
    pub pin: u8,
    pub mode: Mode,
    #[serde(default)]
    pub output_type: OutputType,
    #[serde(default)]
    pub speed: Speed,
    #[serde(default)]
    pub pull: Pull,
    /// Alternate function number, for `mode = "alternate"`.
    #[serde(default)]
    pub af: u8,
    /// Level at which the pin is "on" (LED lit, button pressed).
    #[serde(default)]
    pub active: Level,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UartConfig {
    pub instance: DeviceId,
    pub baud: u32,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UsbConfig {
    /// Root hub port the device stack runs on.
    pub device_rhport: Option<u8>,
    /// Root hub port the host stack runs on.
    pub host_rhport: Option<u8>,
    /// Sense VBUS on PA9 for the full-speed port.
    #[serde(default)]
    pub fs_vbus_sense: bool,
    /// Not supported; accepted only so it can be rejected with a clear error.
    #[serde(default)]
    pub hs_vbus_sense: bool,
    /// ULPI PHY pins, required if port 1 is used.
    #[serde(default)]
    pub ulpi: Vec<PinRef>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PinRef {
    pub port: Port,
    pub pin: u8,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TickConfig {
    #[serde(default)]
    pub mode: TickMode,
    /// Highest priority from which the RTOS may be called; USB interrupts
    /// are placed here in RTOS mode.
    pub max_syscall_priority: Option<u8>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TickMode {
    /// SysTick at 1kHz drives the board's millisecond counter.
    #[default]
    BareMetal,
    /// The RTOS owns SysTick.
    Rtos,
}

macro_rules! to_tokens_enum {
    ($(#[$m:meta])* pub enum $Enum:ident { $($(#[$vm:meta])* $Variant:ident),* $(,)? }) => {
        $(#[$m])*
        pub enum $Enum {
            $($(#[$vm])* $Variant),*
        }

        impl quote::ToTokens for $Enum {
            fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
                use proc_macro2::{Ident, Punct, Spacing, Span};
                match self {
                    $(Self::$Variant => {
                        tokens.append(Ident::new(stringify!($Enum), Span::call_site()));
                        tokens.append(Punct::new(':', Spacing::Joint));
                        tokens.append(Punct::new(':', Spacing::Alone));
                        tokens.append(Ident::new(stringify!($Variant), Span::call_site()));
                    }),*
                }
            }
        }
    };
}

to_tokens_enum! {
    #[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
    pub enum Port { A, B, C, D, E, F, G, H, I, J, K }
}

to_tokens_enum! {
    #[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case")]
    pub enum Mode { Input, Output, Alternate, Analog }
}

to_tokens_enum! {
    #[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case")]
    pub enum OutputType {
        #[default]
        PushPull,
        OpenDrain,
    }
}

to_tokens_enum! {
    #[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case")]
    pub enum Speed {
        #[default]
        Low,
        Medium,
        High,
        VeryHigh,
    }
}

to_tokens_enum! {
    #[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case")]
    pub enum Pull {
        #[default]
        None,
        Up,
        Down,
    }
}

to_tokens_enum! {
    #[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case")]
    pub enum Level {
        Low,
        #[default]
        High,
    }
}

to_tokens_enum! {
    #[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum DeviceId {
        Usart1, Usart2, Usart3, Uart4, Uart5, Usart6, Uart7, Uart8,
    }
}

impl BoardConfig {
    /// Loads the board file named by `$BOARD_CONFIG`, or [`DEFAULT_BOARD`],
    /// and checks it. Relative paths are taken from the crate being built.
    ///
    /// Emits the `cargo:rerun-if-*` lines for both the variable and the file.
    pub fn load() -> Result<Self> {
        println!("cargo:rerun-if-env-changed={CONFIG_VAR}");

        let manifest_dir = PathBuf::from(
            env::var("CARGO_MANIFEST_DIR")
                .context("CARGO_MANIFEST_DIR not set; not in a build script?")?,
        );
        let path = match env::var_os(CONFIG_VAR) {
            Some(p) => manifest_dir.join(p),
            None => {
                println!("--- ${CONFIG_VAR} not present, using default ---");
                manifest_dir.join(DEFAULT_BOARD)
            }
        };
        println!("cargo:rerun-if-changed={}", path.display());

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading board file {}", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("in board file {}", path.display()))
    }

    /// Parses and checks a board description.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut used: BTreeMap<(Port, u8), &str> = BTreeMap::new();
        for (name, pin) in &self.pins {
            check_pin(name, pin.port, pin.pin)?;
            if let Some(other) = used.insert((pin.port, pin.pin), name) {
                bail!(
                    "pins `{other}` and `{name}` are both P{:?}{}",
                    pin.port,
                    pin.pin
                );
            }
            if pin.af >= 16 {
                bail!("pin `{name}`: alternate function {} is not 0..15", pin.af);
            }
            if pin.af != 0 && pin.mode != Mode::Alternate {
                bail!("pin `{name}`: `af` requires mode = \"alternate\"");
            }
        }

        if let Some(led) = &self.led {
            let pin = self.named_pin("led", led)?;
            if pin.mode != Mode::Output {
                bail!("LED pin `{led}` must be an output");
            }
        }
        if let Some(button) = &self.button {
            let pin = self.named_pin("button", button)?;
            if pin.mode != Mode::Input {
                bail!("button pin `{button}` must be an input");
            }
        }

        if let Some(uart) = &self.uart {
            if uart.baud == 0 {
                bail!("uart {:?}: baud rate must be nonzero", uart.instance);
            }
        }

        self.validate_usb(&used)?;

        match (self.tick.mode, self.tick.max_syscall_priority) {
            (TickMode::Rtos, None) => {
                bail!("tick mode \"rtos\" requires `max-syscall-priority`")
            }
            (_, Some(p)) if p >= PRIORITY_LEVELS => {
                bail!("max-syscall-priority {p} is not 0..{}", PRIORITY_LEVELS - 1)
            }
            _ => (),
        }

        Ok(())
    }

    fn validate_usb(&self, used: &BTreeMap<(Port, u8), &str>) -> Result<()> {
        let usb = &self.usb;
        for (role, port) in
            [("device", usb.device_rhport), ("host", usb.host_rhport)]
        {
            if let Some(p) = port {
                if p > 1 {
                    bail!("usb {role}-rhport {p} does not exist (0 = FS, 1 = HS)");
                }
            }
        }
        if usb.device_rhport.is_some() && usb.device_rhport == usb.host_rhport {
            bail!("usb device and host roles can't share a root hub port");
        }
        if usb.hs_vbus_sense {
            bail!("VBUS sensing on the high-speed port is not supported");
        }

        if usb.uses_hs() {
            if usb.ulpi.is_empty() {
                bail!("usb port 1 (HS) is in use but no `ulpi` pins are listed");
            }
            let mut seen = Vec::new();
            for p in &usb.ulpi {
                check_pin("ulpi", p.port, p.pin)?;
                if let Some(name) = used.get(&(p.port, p.pin)) {
                    bail!(
                        "ULPI pin P{:?}{} is also configured as `{name}`",
                        p.port,
                        p.pin
                    );
                }
                if seen.contains(&(p.port, p.pin)) {
                    bail!("ULPI pin P{:?}{} is listed twice", p.port, p.pin);
                }
                seen.push((p.port, p.pin));
            }
        }
        Ok(())
    }

    fn named_pin(&self, what: &str, name: &str) -> Result<&PinConfig> {
        self.pins.get(name).with_context(|| {
            format!("{what} refers to pin `{name}`, which is not in [pins]")
        })
    }

    /// Generates the board's `const` items. The output expects `BoardConfig`,
    /// `BoardPin`, `UartConfig`, `UsbConfig`, `TickMode`, the GPIO types and
    /// `DeviceId` to be in scope.
    pub fn generate(&self) -> Result<proc_macro2::TokenStream> {
        let pin_tokens = |name: &str, p: &PinConfig| {
            let PinConfig {
                port,
                mode,
                output_type,
                speed,
                pull,
                active,
                ..
            } = p;
            let index = usize::from(p.pin);
            let af = format_ident!("AF{}", p.af);
            quote! {
                BoardPin {
                    name: #name,
                    pins: #port.pin(#index),
                    config: PinConfig {
                        mode: #mode,
                        output_type: #output_type,
                        speed: #speed,
                        pull: #pull,
                        alternate: Alternate::#af,
                    },
                    active: #active,
                }
            }
        };

        let pins = self
            .pins
            .iter()
            .map(|(name, p)| pin_tokens(name.as_str(), p));
        let lookup = |name: &Option<String>| -> Result<proc_macro2::TokenStream> {
            Ok(match name {
                Some(n) => {
                    let p = self.named_pin("board", n)?;
                    let t = pin_tokens(n.as_str(), p);
                    quote! { Some(#t) }
                }
                None => quote! { None },
            })
        };
        let led = lookup(&self.led)?;
        let button = lookup(&self.button)?;

        let uart = match &self.uart {
            Some(UartConfig { instance, baud }) => quote! {
                Some(UartConfig { device: #instance, baud: #baud })
            },
            None => quote! { None },
        };

        let rhport = |p: Option<u8>| match p {
            Some(p) => quote! { Some(#p) },
            None => quote! { None },
        };
        let device_rhport = rhport(self.usb.device_rhport);
        let host_rhport = rhport(self.usb.host_rhport);
        let fs_vbus_sense = self.usb.fs_vbus_sense;
        let ulpi = self.usb.ulpi.iter().map(|PinRef { port, pin }| {
            let index = usize::from(*pin);
            quote! { #port.pin(#index) }
        });

        let tick = match (self.tick.mode, self.tick.max_syscall_priority) {
            (TickMode::Rtos, Some(p)) => {
                quote! { TickMode::Rtos { max_syscall_priority: #p } }
            }
            (TickMode::Rtos, None) => {
                bail!("tick mode \"rtos\" requires `max-syscall-priority`")
            }
            (TickMode::BareMetal, _) => quote! { TickMode::BareMetal },
        };

        let name = &self.name;
        Ok(quote! {
            pub const PINS: &[BoardPin] = &[ #( #pins ),* ];

            pub const BOARD: BoardConfig = BoardConfig {
                name: #name,
                pins: PINS,
                led: #led,
                button: #button,
                uart: #uart,
                usb: UsbConfig {
                    device_rhport: #device_rhport,
                    host_rhport: #host_rhport,
                    fs_vbus_sense: #fs_vbus_sense,
                    ulpi: &[ #( #ulpi ),* ],
                },
                tick: #tick,
            };
        })
    }

    /// Writes [`generate`](Self::generate)'s output to `$OUT_DIR/<file>`.
    pub fn write_to_out_dir(&self, file: &str) -> Result<()> {
        let out_dir = env::var("OUT_DIR").context("OUT_DIR not set")?;
        let dest = Path::new(&out_dir).join(file);
        let generated = self.generate()?;
        std::fs::write(&dest, generated.to_string())
            .with_context(|| format!("writing {}", dest.display()))?;
        Ok(())
    }
}

impl UsbConfig {
    /// Whether anything runs on root hub port 1, the HS block.
    pub fn uses_hs(&self) -> bool {
        self.device_rhport == Some(1) || self.host_rhport == Some(1)
    }
}

fn check_pin(name: &str, port: Port, pin: u8) -> Result<()> {
    if pin >= PINS_PER_PORT {
        bail!(
            "pin `{name}`: P{port:?}{pin} is out of range (ports have {PINS_PER_PORT} pins)"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const NUCLEO: &str = indoc! {r#"
        name = "nucleo-h743zi2"
        led = "led1"
        button = "user"

        [pins.led1]
        port = "B"
        pin = 0
        mode = "output"

        [pins.user]
        port = "C"
        pin = 13
        mode = "input"
        pull = "down"

        [pins.uart-tx]
        port = "D"
        pin = 8
        mode = "alternate"
        af = 7
        speed = "high"

        [pins.uart-rx]
        port = "D"
        pin = 9
        mode = "alternate"
        af = 7
        speed = "high"

        [uart]
        instance = "usart3"
        baud = 115200

        [usb]
        device-rhport = 0
    "#};

    fn err(text: &str) -> String {
        format!("{:#}", BoardConfig::parse(text).unwrap_err())
    }

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn parses_nucleo() {
        let cfg = BoardConfig::parse(NUCLEO).unwrap();
        assert_eq!(cfg.name, "nucleo-h743zi2");
        let names: Vec<&str> = cfg.pins.keys().map(String::as_str).collect();
        assert_eq!(names, ["led1", "user", "uart-tx", "uart-rx"]);
        assert_eq!(cfg.pins["led1"].active, Level::High);
        assert_eq!(cfg.pins["led1"].speed, Speed::Low);
        assert_eq!(cfg.pins["user"].pull, Pull::Down);
        assert_eq!(cfg.uart.as_ref().map(|u| u.instance), Some(DeviceId::Usart3));
        assert_eq!(cfg.tick.mode, TickMode::BareMetal);
        assert!(!cfg.usb.uses_hs());
    }

    #[test]
    fn generated_code() {
        let cfg = BoardConfig::parse(NUCLEO).unwrap();
        let code = squash(&cfg.generate().unwrap().to_string());

        assert!(code.contains("pins:Port::B.pin(0usize)"), "{code}");
        assert!(code.contains("alternate:Alternate::AF7"), "{code}");
        assert!(code.contains("pull:Pull::Down"), "{code}");
        assert!(code.contains(
            "uart:Some(UartConfig{device:DeviceId::Usart3,baud:115200u32})"
        ));
        assert!(code.contains("device_rhport:Some(0u8)"));
        assert!(code.contains("host_rhport:None"));
        assert!(code.contains("tick:TickMode::BareMetal"));
        // The table keeps file order.
        let led = code.find("name:\"led1\"").unwrap();
        let tx = code.find("name:\"uart-tx\"").unwrap();
        assert!(led < tx);
    }

    #[test]
    fn rtos_tick() {
        let text = format!(
            "{NUCLEO}{}",
            indoc! {r#"
                [tick]
                mode = "rtos"
                max-syscall-priority = 5
            "#}
        );
        let cfg = BoardConfig::parse(&text).unwrap();
        let code = squash(&cfg.generate().unwrap().to_string());
        assert!(code.contains("TickMode::Rtos{max_syscall_priority:5u8}"));
    }

    #[test]
    fn rtos_needs_priority() {
        let e = err(indoc! {r#"
            name = "x"
            [tick]
            mode = "rtos"
        "#});
        assert!(e.contains("max-syscall-priority"), "{e}");

        let e = err(indoc! {r#"
            name = "x"
            [tick]
            mode = "rtos"
            max-syscall-priority = 16
        "#});
        assert!(e.contains("not 0..15"), "{e}");
    }

    #[test]
    fn rejects_bad_pins() {
        let e = err(indoc! {r#"
            name = "x"
            [pins.a]
            port = "A"
            pin = 16
            mode = "input"
        "#});
        assert!(e.contains("out of range"), "{e}");

        let e = err(indoc! {r#"
            name = "x"
            [pins.a]
            port = "A"
            pin = 1
            mode = "input"
            [pins.b]
            port = "A"
            pin = 1
            mode = "output"
        "#});
        assert!(e.contains("both PA1"), "{e}");

        let e = err(indoc! {r#"
            name = "x"
            [pins.a]
            port = "A"
            pin = 1
            mode = "alternate"
            af = 16
        "#});
        assert!(e.contains("alternate function 16"), "{e}");
    }

    #[test]
    fn duplicate_names_are_parse_errors() {
        assert!(BoardConfig::parse(indoc! {r#"
            name = "x"
            [pins.a]
            port = "A"
            pin = 1
            mode = "input"
            [pins.a]
            port = "A"
            pin = 2
            mode = "input"
        "#})
        .is_err());
    }

    #[test]
    fn rejects_unknown_led_and_button() {
        let e = err(indoc! {r#"
            name = "x"
            led = "nope"
        "#});
        assert!(e.contains("led refers to pin `nope`"), "{e}");

        let e = err(indoc! {r#"
            name = "x"
            button = "b"
            [pins.b]
            port = "C"
            pin = 13
            mode = "output"
        "#});
        assert!(e.contains("must be an input"), "{e}");
    }

    #[test]
    fn rejects_unknown_fields() {
        let e = err(indoc! {r#"
            name = "x"
            [uart]
            instance = "usart3"
            baud = 115200
            parity = "even"
        "#});
        assert!(e.contains("parity"), "{e}");

        // No instance, no UART.
        let e = err(indoc! {r#"
            name = "x"
            [uart]
            baud = 115200
        "#});
        assert!(e.contains("instance"), "{e}");
    }

    #[test]
    fn usb_roles() {
        let e = err(indoc! {r#"
            name = "x"
            [usb]
            device-rhport = 1
        "#});
        assert!(e.contains("no `ulpi` pins"), "{e}");

        let e = err(indoc! {r#"
            name = "x"
            [usb]
            device-rhport = 0
            hs-vbus-sense = true
        "#});
        assert!(e.contains("high-speed"), "{e}");

        let e = err(indoc! {r#"
            name = "x"
            [usb]
            device-rhport = 0
            host-rhport = 0
        "#});
        assert!(e.contains("share"), "{e}");

        let e = err(indoc! {r#"
            name = "x"
            [usb]
            host-rhport = 2
        "#});
        assert!(e.contains("does not exist"), "{e}");
    }

    #[test]
    fn hs_port_with_ulpi() {
        let cfg = BoardConfig::parse(indoc! {r#"
            name = "x"
            [usb]
            device-rhport = 0
            host-rhport = 1
            ulpi = [
                { port = "A", pin = 3 },
                { port = "A", pin = 5 },
                { port = "C", pin = 0 },
            ]
        "#})
        .unwrap();
        assert!(cfg.usb.uses_hs());
        let code = squash(&cfg.generate().unwrap().to_string());
        assert!(code.contains(
            "ulpi:&[Port::A.pin(3usize),Port::A.pin(5usize),Port::C.pin(0usize)]"
        ));
        assert!(code.contains("host_rhport:Some(1u8)"));

        let e = err(indoc! {r#"
            name = "x"
            [pins.a]
            port = "A"
            pin = 3
            mode = "input"
            [usb]
            device-rhport = 1
            ulpi = [{ port = "A", pin = 3 }]
        "#});
        assert!(e.contains("also configured as `a`"), "{e}");
    }
}
