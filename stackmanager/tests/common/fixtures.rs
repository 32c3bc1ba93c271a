//! Test fixtures and data for stack manager tests

use std::time::Duration;

use stackmanager::core::checksum::md5_hex;
use stackmanager::{Platform, RetryPolicy, StackConfig};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Content every mocked local artifact holds
    pub const PAYLOAD: &'static [u8] = b"installed artifact bytes";

    pub const COORDINATOR_ID: &'static str = "550e8400-e29b-41d4-a716-446655440001";
    pub const DOMAIN_NAME: &'static str = "bobtown";
    pub const RUNNING_VERSION: &'static str = "11";

    pub const CONTENT_SET_URL: &'static str = "https://content.test/sets/garden.svo?path=/plaza";

    pub const MONITOR_PID: u32 = 2000;
    pub const COORDINATOR_PID: u32 = 1000;
    pub const WORKER_PID: u32 = 3000;

    /// Checksum that matches `PAYLOAD`
    pub fn matching_checksum() -> String {
        format!("{}\n", md5_hex(Self::PAYLOAD))
    }

    pub fn stale_checksum() -> String {
        md5_hex(b"a newer build")
    }

    /// Linux config with short timeouts; nothing touches the disk through it
    pub fn config() -> StackConfig {
        let mut config = StackConfig::new("/stack-test").with_platform(Platform::Linux);
        config.stop_timeout = Duration::from_millis(20);
        config.identity_retry = RetryPolicy {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            max_attempts: 3,
        };
        config.running_version = Self::RUNNING_VERSION.to_string();
        config
    }

    pub fn directory_entry() -> String {
        format!(r#"{{"domain":{{"id":"{}","name":"{}"}}}}"#, Self::COORDINATOR_ID, Self::DOMAIN_NAME)
    }

    /// Manifest advertising build 12 of this launcher for linux and mac
    pub fn manifest() -> String {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<projects>
  <project name="stackmanager">
    <platform name="ubuntu">
      <build>
        <version>10</version>
        <url>https://builds.test/stackmanager-10.tar.gz</url>
        <timestamp>2015-03-01</timestamp>
      </build>
      <build>
        <note>Faster startup</note>
        <url>https://builds.test/stackmanager-12.tar.gz</url>
        <version>12</version>
        <timestamp>2015-04-01</timestamp>
      </build>
    </platform>
    <platform name="solaris">
      <build><version>99</version><url>https://builds.test/solaris</url></build>
    </platform>
    <platform name="mac">
      <build><version>12</version><url>https://builds.test/stackmanager-12.dmg</url></build>
    </platform>
  </project>
  <project name="interface">
    <platform name="ubuntu">
      <build><version>400</version><url>https://builds.test/interface</url></build>
    </platform>
  </project>
</projects>"#
            .to_string()
    }
}
