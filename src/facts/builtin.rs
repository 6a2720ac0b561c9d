//! Built-in fact definitions.
//!
//! The stock fact library: identity and OS facts, package inventories
//! guarded by probes for their package manager, user accounts, and a
//! parameterised file fact. [`register_builtins`] installs them all into
//! the process-wide registry at startup.

use serde_json::{json, Map, Value as JsonValue};

use crate::error::{Error, Result};
use crate::facts::registry::registry;
use crate::facts::{DerivedFact, Fact, FactCommand, FactParam, RenderedArguments};

/// Register every built-in fact. Call once at process initialisation,
/// before orchestration starts; a second call is a duplicate-registration
/// error.
pub fn register_builtins() -> Result<()> {
    let registry = registry();
    registry.register(Hostname)?;
    registry.register(KernelVersion)?;
    registry.register(OsRelease)?;
    registry.register(DebPackages)?;
    registry.register(RpmPackages)?;
    registry.register(Users)?;
    registry.register(File)?;
    registry.register_derived(PackageNames)?;
    Ok(())
}

/// The host's hostname.
pub struct Hostname;

impl Fact for Hostname {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn command(&self) -> FactCommand {
        "hostname".into()
    }

    fn parse(&self, stdout: &[String]) -> Result<JsonValue> {
        Ok(json!(stdout[0].trim()))
    }
}

/// The running kernel release string.
pub struct KernelVersion;

impl Fact for KernelVersion {
    fn name(&self) -> &'static str {
        "kernel_version"
    }

    fn command(&self) -> FactCommand {
        "uname -r".into()
    }

    fn parse(&self, stdout: &[String]) -> Result<JsonValue> {
        Ok(json!(stdout[0].trim()))
    }
}

/// Key/value pairs from `/etc/os-release`.
pub struct OsRelease;

impl Fact for OsRelease {
    fn name(&self) -> &'static str {
        "os_release"
    }

    fn command(&self) -> FactCommand {
        "cat /etc/os-release".into()
    }

    fn default(&self) -> JsonValue {
        json!({})
    }

    fn parse(&self, stdout: &[String]) -> Result<JsonValue> {
        let mut release = Map::new();
        for line in stdout {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::fact_parse(self.name(), format!("bad line: {line}")))?;
            release.insert(
                key.to_string(),
                json!(value.trim_matches('"')),
            );
        }
        Ok(JsonValue::Object(release))
    }
}

/// Installed dpkg packages, name -> list of installed versions. Empty on
/// hosts without dpkg.
pub struct DebPackages;

impl Fact for DebPackages {
    fn name(&self) -> &'static str {
        "deb_packages"
    }

    fn command(&self) -> FactCommand {
        r"dpkg-query -W -f '${Package} ${Version}\n'".into()
    }

    fn requires_command(&self) -> Option<FactCommand> {
        Some("dpkg-query".into())
    }

    fn default(&self) -> JsonValue {
        json!({})
    }

    fn parse(&self, stdout: &[String]) -> Result<JsonValue> {
        parse_package_lines(self.name(), stdout)
    }
}

/// Installed rpm packages, name -> list of installed versions. Empty on
/// hosts without rpm.
pub struct RpmPackages;

impl Fact for RpmPackages {
    fn name(&self) -> &'static str {
        "rpm_packages"
    }

    fn command(&self) -> FactCommand {
        r"rpm -qa --queryformat '%{NAME} %{VERSION}-%{RELEASE}\n'".into()
    }

    fn requires_command(&self) -> Option<FactCommand> {
        Some("rpm".into())
    }

    fn default(&self) -> JsonValue {
        json!({})
    }

    fn parse(&self, stdout: &[String]) -> Result<JsonValue> {
        parse_package_lines(self.name(), stdout)
    }
}

fn parse_package_lines(fact: &str, stdout: &[String]) -> Result<JsonValue> {
    let mut packages: Map<String, JsonValue> = Map::new();
    for line in stdout {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, version) = line
            .split_once(' ')
            .ok_or_else(|| Error::fact_parse(fact, format!("bad package line: {line}")))?;
        packages
            .entry(name.to_string())
            .or_insert_with(|| json!([]))
            .as_array_mut()
            .expect("package versions are arrays")
            .push(json!(version));
    }
    Ok(JsonValue::Object(packages))
}

/// User accounts from `/etc/passwd`, name -> record.
pub struct Users;

impl Fact for Users {
    fn name(&self) -> &'static str {
        "users"
    }

    fn command(&self) -> FactCommand {
        "cat /etc/passwd".into()
    }

    fn default(&self) -> JsonValue {
        json!({})
    }

    fn parse(&self, stdout: &[String]) -> Result<JsonValue> {
        let mut users = Map::new();
        for line in stdout {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 7 {
                return Err(Error::fact_parse(
                    self.name(),
                    format!("bad passwd line: {line}"),
                ));
            }
            let uid: u32 = fields[2]
                .parse()
                .map_err(|_| Error::fact_parse(self.name(), format!("bad uid: {}", fields[2])))?;
            let gid: u32 = fields[3]
                .parse()
                .map_err(|_| Error::fact_parse(self.name(), format!("bad gid: {}", fields[3])))?;
            users.insert(
                fields[0].to_string(),
                json!({
                    "uid": uid,
                    "gid": gid,
                    "home": fields[5],
                    "shell": fields[6],
                }),
            );
        }
        Ok(JsonValue::Object(users))
    }
}

/// Metadata for one remote file; takes a `path` parameter. Null when the
/// path does not exist.
pub struct File;

fn file_command(arguments: &RenderedArguments) -> Result<String> {
    let path = arguments
        .get("path")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::fact_command("file", "`path` must be a string"))?;
    let path = shell_words::quote(path);
    Ok(format!(
        "! test -e {path} || stat -c 'mode=%a user=%U group=%G size=%s' {path}"
    ))
}

impl Fact for File {
    fn name(&self) -> &'static str {
        "file"
    }

    fn command(&self) -> FactCommand {
        FactCommand::Templated(file_command)
    }

    fn params(&self) -> Vec<FactParam> {
        vec![FactParam::required("path")]
    }

    fn parse(&self, stdout: &[String]) -> Result<JsonValue> {
        let mut stat = Map::new();
        for pair in stdout[0].split_whitespace() {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::fact_parse(self.name(), format!("bad stat field: {pair}")))?;
            let value = match key {
                "size" => json!(value.parse::<u64>().map_err(|_| {
                    Error::fact_parse(self.name(), format!("bad size: {value}"))
                })?),
                _ => json!(value),
            };
            stat.insert(key.to_string(), value);
        }
        Ok(JsonValue::Object(stat))
    }
}

/// Names of installed dpkg packages, derived from [`DebPackages`].
pub struct PackageNames;

impl DerivedFact for PackageNames {
    fn name(&self) -> &'static str {
        "package_names"
    }

    fn source(&self) -> &'static str {
        "deb_packages"
    }

    fn transform(&self, data: JsonValue) -> JsonValue {
        match data {
            JsonValue::Object(packages) => {
                json!(packages.keys().collect::<Vec<_>>())
            }
            _ => json!([]),
        }
    }
}
