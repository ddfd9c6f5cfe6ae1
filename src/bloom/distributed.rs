//! Redis-backed Bloom filter: same five-hash scheme as the local variant,
//! but the bits live in a single Redis bit string shared across crawlers.
//! `Has`/`Add` each issue one server-side atomic script so a read-then-set
//! race never splits across a network round trip. Fails open on Redis
//! errors: a failed `Has` reports `false` (may re-crawl, never loses a URL).

use redis::aio::ConnectionManager;
use redis::Script;
use tracing::warn;

use super::{hash_bit, SEEDS};

const HAS_SCRIPT: &str = r#"
for i = 2, #ARGV do
    local bit = tonumber(ARGV[i])
    if redis.call('GETBIT', KEYS[1], bit) == 0 then
        return 0
    end
end
return 1
"#;

const ADD_SCRIPT: &str = r#"
for i = 2, #ARGV do
    local bit = tonumber(ARGV[i])
    redis.call('SETBIT', KEYS[1], bit, 1)
end
return 1
"#;

pub struct DistributedBloomFilter {
    key: String,
    bit_count: u64,
    has_script: Script,
    add_script: Script,
}

impl DistributedBloomFilter {
    pub fn new(key: impl Into<String>, bit_count: u64) -> Self {
        DistributedBloomFilter {
            key: key.into(),
            bit_count,
            has_script: Script::new(HAS_SCRIPT),
            add_script: Script::new(ADD_SCRIPT),
        }
    }

    fn bit_positions(&self, url: &str) -> [u64; 5] {
        let mut positions = [0u64; 5];
        for (i, seed) in SEEDS.iter().enumerate() {
            positions[i] = hash_bit(url, *seed, self.bit_count);
        }
        positions
    }

    pub async fn has(&self, conn: &mut ConnectionManager, url: &str) -> bool {
        let positions = self.bit_positions(url);
        let mut invocation = self.has_script.key(&self.key).arg(self.bit_count);
        for bit in positions {
            invocation = invocation.arg(bit);
        }
        match invocation.invoke_async::<_, i64>(conn).await {
            Ok(v) => v == 1,
            Err(err) => {
                warn!(error = %err, url, "distributed bloom Has failed, treating as unseen");
                false
            }
        }
    }

    pub async fn add(&self, conn: &mut ConnectionManager, url: &str) {
        let positions = self.bit_positions(url);
        let mut invocation = self.add_script.key(&self.key).arg(self.bit_count);
        for bit in positions {
            invocation = invocation.arg(bit);
        }
        if let Err(err) = invocation.invoke_async::<_, i64>(conn).await {
            warn!(error = %err, url, "distributed bloom Add failed");
        }
    }
}
