//! Test doubles for the native-client seams
//!
//! `MemoryClient` is a self-contained single-node driver over an
//! in-memory store, complete enough to exercise the connection layer end
//! to end: strings, hashes, lists, sets, sorted sets, streams, scan
//! batches, BITFIELD overflow policies, and WATCH/MULTI semantics.
//! `external_write` mutates the shared store the way another client
//! would, which is what triggers watch aborts.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use valkey_bridge::driver::BatchEntry;
use valkey_bridge::{NativeClient, ValkeyError, ValkeyResult, Value};

#[derive(Default)]
pub struct Store {
    pub strings: BTreeMap<Vec<u8>, Vec<u8>>,
    pub hashes: BTreeMap<Vec<u8>, Vec<(Vec<u8>, Vec<u8>)>>,
    pub lists: BTreeMap<Vec<u8>, Vec<Vec<u8>>>,
    pub sets: BTreeMap<Vec<u8>, Vec<Vec<u8>>>,
    pub zsets: BTreeMap<Vec<u8>, Vec<(Vec<u8>, f64)>>,
    pub streams: BTreeMap<Vec<u8>, Vec<(String, Vec<(Vec<u8>, Vec<u8>)>)>>,
    versions: BTreeMap<Vec<u8>, u64>,
    clock: u64,
}

impl Store {
    fn touch(&mut self, key: &[u8]) {
        self.clock += 1;
        self.versions.insert(key.to_vec(), self.clock);
    }

    fn version(&self, key: &[u8]) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn all_keys(&self) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self
            .strings
            .keys()
            .chain(self.hashes.keys())
            .chain(self.lists.keys())
            .chain(self.sets.keys())
            .chain(self.zsets.keys())
            .chain(self.streams.keys())
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn remove_key(&mut self, key: &[u8]) -> bool {
        let existed = self.strings.remove(key).is_some()
            | self.hashes.remove(key).is_some()
            | self.lists.remove(key).is_some()
            | self.sets.remove(key).is_some()
            | self.zsets.remove(key).is_some()
            | self.streams.remove(key).is_some();
        if existed {
            self.touch(key);
        }
        existed
    }
}

pub type SharedStore = Arc<Mutex<Store>>;

/// Fresh shared store
pub fn shared_store() -> SharedStore {
    Arc::new(Mutex::new(Store::default()))
}

/// Mutate the store the way another client would, bumping key versions
pub fn external_write(store: &SharedStore, key: &[u8], value: &[u8]) {
    let mut store = store.lock().unwrap();
    store.strings.insert(key.to_vec(), value.to_vec());
    store.touch(key);
}

/// Single-node driver double over a shared in-memory store
pub struct MemoryClient {
    store: SharedStore,
    watched: Vec<(Vec<u8>, u64)>,
}

impl MemoryClient {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            watched: Vec::new(),
        }
    }

    fn dispatch(&mut self, args: &[Bytes]) -> Value {
        let Some(name) = args.first() else {
            return Value::Error("ERR empty command".to_string());
        };
        let name = String::from_utf8_lossy(name).to_uppercase();
        let rest = &args[1..];

        match name.as_str() {
            "PING" => Value::Simple("PONG".to_string()),
            "ECHO" => rest
                .first()
                .map_or(Value::Nil, |msg| Value::Bytes(msg.clone())),
            "SELECT" => Value::Simple("OK".to_string()),
            "WATCH" => {
                let store = self.store.lock().unwrap();
                for key in rest {
                    self.watched.push((key.to_vec(), store.version(key)));
                }
                Value::Simple("OK".to_string())
            }
            "UNWATCH" => {
                self.watched.clear();
                Value::Simple("OK".to_string())
            }
            "SET" => self.with_store(rest, |store, rest| {
                store.strings.insert(rest[0].to_vec(), rest[1].to_vec());
                store.touch(&rest[0]);
                Value::Simple("OK".to_string())
            }),
            "GET" => self.with_store(rest, |store, rest| {
                string_value(store.strings.get(rest[0].as_ref()))
            }),
            "GETDEL" => self.with_store(rest, |store, rest| {
                let value = store.strings.remove(rest[0].as_ref());
                if value.is_some() {
                    store.touch(&rest[0]);
                }
                string_value(value.as_ref())
            }),
            "MGET" => self.with_store(rest, |store, rest| {
                Value::Array(
                    rest.iter()
                        .map(|key| string_value(store.strings.get(key.as_ref())))
                        .collect(),
                )
            }),
            "MSET" => self.with_store(rest, |store, rest| {
                for pair in rest.chunks_exact(2) {
                    store.strings.insert(pair[0].to_vec(), pair[1].to_vec());
                    store.touch(&pair[0]);
                }
                Value::Simple("OK".to_string())
            }),
            "DEL" | "UNLINK" => self.with_store(rest, |store, rest| {
                let removed = rest.iter().filter(|key| store.remove_key(key)).count();
                Value::Int(removed as i64)
            }),
            "EXISTS" => self.with_store(rest, |store, rest| {
                let found = rest
                    .iter()
                    .filter(|key| store.all_keys().contains(&key.to_vec()))
                    .count();
                Value::Int(found as i64)
            }),
            "TYPE" => self.with_store(rest, |store, rest| {
                let key: &[u8] = rest[0].as_ref();
                let type_name = if store.strings.contains_key(key) {
                    "string"
                } else if store.hashes.contains_key(key) {
                    "hash"
                } else if store.lists.contains_key(key) {
                    "list"
                } else if store.sets.contains_key(key) {
                    "set"
                } else if store.zsets.contains_key(key) {
                    "zset"
                } else if store.streams.contains_key(key) {
                    "stream"
                } else {
                    "none"
                };
                Value::Simple(type_name.to_string())
            }),
            "INCR" => self.incr_by(rest, 1),
            "DECR" => self.incr_by(rest, -1),
            "INCRBY" => match parse_int(rest.get(1)) {
                Ok(delta) => self.incr_by(rest, delta),
                Err(err) => err,
            },
            "DECRBY" => match parse_int(rest.get(1)) {
                Ok(delta) => self.incr_by(rest, -delta),
                Err(err) => err,
            },
            "APPEND" => self.with_store(rest, |store, rest| {
                let entry = store.strings.entry(rest[0].to_vec()).or_default();
                entry.extend_from_slice(&rest[1]);
                let len = entry.len() as i64;
                store.touch(&rest[0]);
                Value::Int(len)
            }),
            "STRLEN" => self.with_store(rest, |store, rest| {
                Value::Int(store.strings.get(rest[0].as_ref()).map_or(0, Vec::len) as i64)
            }),
            "BITFIELD" => self.bitfield(rest),
            "HSET" => self.with_store(rest, |store, rest| {
                let hash = store.hashes.entry(rest[0].to_vec()).or_default();
                let mut added = 0;
                for pair in rest[1..].chunks_exact(2) {
                    let field = pair[0].to_vec();
                    let value = pair[1].to_vec();
                    if let Some(entry) = hash.iter_mut().find(|(f, _)| *f == field) {
                        entry.1 = value;
                    } else {
                        hash.push((field, value));
                        added += 1;
                    }
                }
                store.touch(&rest[0]);
                Value::Int(added)
            }),
            "HGET" => self.with_store(rest, |store, rest| {
                store
                    .hashes
                    .get(rest[0].as_ref())
                    .and_then(|hash| hash.iter().find(|(f, _)| f == rest[1].as_ref()))
                    .map_or(Value::Nil, |(_, v)| Value::Bytes(Bytes::from(v.clone())))
            }),
            "HGETALL" => self.with_store(rest, |store, rest| {
                let entries = store
                    .hashes
                    .get(rest[0].as_ref())
                    .map(|hash| {
                        hash.iter()
                            .map(|(f, v)| {
                                (
                                    Value::Bytes(Bytes::from(f.clone())),
                                    Value::Bytes(Bytes::from(v.clone())),
                                )
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Value::Map(entries)
            }),
            "HDEL" => self.with_store(rest, |store, rest| {
                let Some(hash) = store.hashes.get_mut(rest[0].as_ref()) else {
                    return Value::Int(0);
                };
                let before = hash.len();
                hash.retain(|(f, _)| !rest[1..].iter().any(|field| f == field.as_ref()));
                let removed = (before - hash.len()) as i64;
                store.touch(&rest[0]);
                Value::Int(removed)
            }),
            "HLEN" => self.with_store(rest, |store, rest| {
                Value::Int(store.hashes.get(rest[0].as_ref()).map_or(0, Vec::len) as i64)
            }),
            "HMGET" => self.with_store(rest, |store, rest| {
                let hash = store.hashes.get(rest[0].as_ref());
                Value::Array(
                    rest[1..]
                        .iter()
                        .map(|field| {
                            hash.and_then(|h| h.iter().find(|(f, _)| f == field.as_ref()))
                                .map_or(Value::Nil, |(_, v)| {
                                    Value::Bytes(Bytes::from(v.clone()))
                                })
                        })
                        .collect(),
                )
            }),
            "HSCAN" => self.hscan(rest),
            "LPUSH" => self.push(rest, true),
            "RPUSH" => self.push(rest, false),
            "LPOP" => self.pop(rest, true),
            "RPOP" => self.pop(rest, false),
            "LLEN" => self.with_store(rest, |store, rest| {
                Value::Int(store.lists.get(rest[0].as_ref()).map_or(0, Vec::len) as i64)
            }),
            "LRANGE" => self.with_store(rest, |store, rest| {
                let Some(list) = store.lists.get(rest[0].as_ref()) else {
                    return Value::Array(Vec::new());
                };
                let (start, stop) = (index_of(&rest[1], list.len()), index_of(&rest[2], list.len()));
                if start > stop || start >= list.len() {
                    return Value::Array(Vec::new());
                }
                let stop = stop.min(list.len() - 1);
                Value::Array(
                    list[start..=stop]
                        .iter()
                        .map(|item| Value::Bytes(Bytes::from(item.clone())))
                        .collect(),
                )
            }),
            "SADD" => self.with_store(rest, |store, rest| {
                let set = store.sets.entry(rest[0].to_vec()).or_default();
                let mut added = 0;
                for member in &rest[1..] {
                    if !set.iter().any(|m| m == member.as_ref()) {
                        set.push(member.to_vec());
                        added += 1;
                    }
                }
                store.touch(&rest[0]);
                Value::Int(added)
            }),
            "SREM" => self.with_store(rest, |store, rest| {
                let Some(set) = store.sets.get_mut(rest[0].as_ref()) else {
                    return Value::Int(0);
                };
                let before = set.len();
                set.retain(|m| !rest[1..].iter().any(|member| m == member.as_ref()));
                let removed = (before - set.len()) as i64;
                store.touch(&rest[0]);
                Value::Int(removed)
            }),
            "SMEMBERS" => self.with_store(rest, |store, rest| {
                Value::Array(
                    store
                        .sets
                        .get(rest[0].as_ref())
                        .map(|set| {
                            set.iter()
                                .map(|m| Value::Bytes(Bytes::from(m.clone())))
                                .collect()
                        })
                        .unwrap_or_default(),
                )
            }),
            "SISMEMBER" => self.with_store(rest, |store, rest| {
                let found = store
                    .sets
                    .get(rest[0].as_ref())
                    .is_some_and(|set| set.iter().any(|m| m == rest[1].as_ref()));
                Value::Int(i64::from(found))
            }),
            "SCARD" => self.with_store(rest, |store, rest| {
                Value::Int(store.sets.get(rest[0].as_ref()).map_or(0, Vec::len) as i64)
            }),
            "SSCAN" => self.sscan(rest),
            "ZADD" => self.with_store(rest, |store, rest| {
                let zset = store.zsets.entry(rest[0].to_vec()).or_default();
                let mut added = 0;
                for pair in rest[1..].chunks_exact(2) {
                    let score: f64 = String::from_utf8_lossy(&pair[0]).parse().unwrap_or(0.0);
                    let member = pair[1].to_vec();
                    if let Some(entry) = zset.iter_mut().find(|(m, _)| *m == member) {
                        entry.1 = score;
                    } else {
                        zset.push((member, score));
                        added += 1;
                    }
                }
                zset.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                store.touch(&rest[0]);
                Value::Int(added)
            }),
            "ZSCORE" => self.with_store(rest, |store, rest| {
                store
                    .zsets
                    .get(rest[0].as_ref())
                    .and_then(|zset| zset.iter().find(|(m, _)| m == rest[1].as_ref()))
                    .map_or(Value::Nil, |(_, score)| {
                        Value::Bytes(Bytes::from(format_score(*score)))
                    })
            }),
            "ZCARD" => self.with_store(rest, |store, rest| {
                Value::Int(store.zsets.get(rest[0].as_ref()).map_or(0, Vec::len) as i64)
            }),
            "ZRANGE" => self.with_store(rest, |store, rest| {
                let Some(zset) = store.zsets.get(rest[0].as_ref()) else {
                    return Value::Array(Vec::new());
                };
                let with_scores = rest
                    .last()
                    .is_some_and(|arg| arg.eq_ignore_ascii_case(b"WITHSCORES"));
                let (start, stop) = (index_of(&rest[1], zset.len()), index_of(&rest[2], zset.len()));
                if start > stop || start >= zset.len() {
                    return Value::Array(Vec::new());
                }
                let stop = stop.min(zset.len() - 1);
                let mut out = Vec::new();
                for (member, score) in &zset[start..=stop] {
                    out.push(Value::Bytes(Bytes::from(member.clone())));
                    if with_scores {
                        out.push(Value::Bytes(Bytes::from(format_score(*score))));
                    }
                }
                Value::Array(out)
            }),
            "XADD" => self.with_store(rest, |store, rest| {
                let stream = store.streams.entry(rest[0].to_vec()).or_default();
                let requested = String::from_utf8_lossy(&rest[1]).into_owned();
                let id = if requested == "*" {
                    format!("{}-0", stream.len() + 1)
                } else {
                    requested
                };
                let fields = rest[2..]
                    .chunks_exact(2)
                    .map(|pair| (pair[0].to_vec(), pair[1].to_vec()))
                    .collect();
                stream.push((id.clone(), fields));
                store.touch(&rest[0]);
                Value::Bytes(Bytes::from(id.into_bytes()))
            }),
            "XLEN" => self.with_store(rest, |store, rest| {
                Value::Int(store.streams.get(rest[0].as_ref()).map_or(0, Vec::len) as i64)
            }),
            "XRANGE" => self.with_store(rest, |store, rest| {
                let entries = store
                    .streams
                    .get(rest[0].as_ref())
                    .map(|stream| stream.iter().map(stream_entry_value).collect())
                    .unwrap_or_default();
                Value::Array(entries)
            }),
            "XREAD" => self.xread(rest),
            "DBSIZE" => {
                let store = self.store.lock().unwrap();
                Value::Int(store.all_keys().len() as i64)
            }
            "FLUSHDB" | "FLUSHALL" => {
                let mut store = self.store.lock().unwrap();
                *store = Store::default();
                Value::Simple("OK".to_string())
            }
            "INFO" => Value::Bytes(Bytes::from_static(
                b"# Server\r\nvalkey_version:8.0.0\r\nuptime_in_seconds:42\r\n",
            )),
            "SCAN" => self.scan(rest),
            "KEYS" => self.with_store(rest, |store, rest| {
                Value::Array(
                    store
                        .all_keys()
                        .into_iter()
                        .filter(|key| glob_match(&rest[0], key))
                        .map(|key| Value::Bytes(Bytes::from(key)))
                        .collect(),
                )
            }),
            other => Value::Error(format!("ERR unknown command '{other}'")),
        }
    }

    fn with_store<F>(&self, rest: &[Bytes], f: F) -> Value
    where
        F: FnOnce(&mut Store, &[Bytes]) -> Value,
    {
        let mut store = self.store.lock().unwrap();
        f(&mut store, rest)
    }

    fn incr_by(&self, rest: &[Bytes], delta: i64) -> Value {
        self.with_store(rest, |store, rest| {
            let entry = store.strings.entry(rest[0].to_vec()).or_insert_with(|| b"0".to_vec());
            let Ok(current) = String::from_utf8_lossy(entry).parse::<i64>() else {
                return Value::Error("ERR value is not an integer or out of range".to_string());
            };
            let next = current + delta;
            *entry = next.to_string().into_bytes();
            store.touch(&rest[0]);
            Value::Int(next)
        })
    }

    fn push(&self, rest: &[Bytes], front: bool) -> Value {
        self.with_store(rest, |store, rest| {
            let list = store.lists.entry(rest[0].to_vec()).or_default();
            for value in &rest[1..] {
                if front {
                    list.insert(0, value.to_vec());
                } else {
                    list.push(value.to_vec());
                }
            }
            let len = list.len() as i64;
            store.touch(&rest[0]);
            Value::Int(len)
        })
    }

    fn pop(&self, rest: &[Bytes], front: bool) -> Value {
        self.with_store(rest, |store, rest| {
            let Some(list) = store.lists.get_mut(rest[0].as_ref()) else {
                return Value::Nil;
            };
            if list.is_empty() {
                return Value::Nil;
            }
            let value = if front { list.remove(0) } else { list.pop().unwrap() };
            store.touch(&rest[0]);
            Value::Bytes(Bytes::from(value))
        })
    }

    fn scan(&self, rest: &[Bytes]) -> Value {
        let store = self.store.lock().unwrap();
        let keys = store.all_keys();
        scan_batch(rest, &keys, |key| Value::Bytes(Bytes::from(key.clone())))
    }

    fn sscan(&self, rest: &[Bytes]) -> Value {
        let store = self.store.lock().unwrap();
        let members = store.sets.get(rest[0].as_ref()).cloned().unwrap_or_default();
        scan_batch(&rest[1..], &members, |member| {
            Value::Bytes(Bytes::from(member.clone()))
        })
    }

    fn hscan(&self, rest: &[Bytes]) -> Value {
        let store = self.store.lock().unwrap();
        let fields = store.hashes.get(rest[0].as_ref()).cloned().unwrap_or_default();
        scan_pairs(&rest[1..], &fields)
    }

    fn xread(&self, rest: &[Bytes]) -> Value {
        let store = self.store.lock().unwrap();
        let streams_at = rest
            .iter()
            .position(|arg| arg.eq_ignore_ascii_case(b"STREAMS"))
            .unwrap_or(rest.len());
        let spec = &rest[streams_at + 1..];
        let stream_count = spec.len() / 2;

        let mut out = Vec::new();
        for i in 0..stream_count {
            let key = &spec[i];
            let after = String::from_utf8_lossy(&spec[stream_count + i]).into_owned();
            let Some(stream) = store.streams.get(key.as_ref()) else {
                continue;
            };
            let entries: Vec<Value> = stream
                .iter()
                .filter(|(id, _)| after == "0" || id.as_str() > after.as_str())
                .map(stream_entry_value)
                .collect();
            if !entries.is_empty() {
                out.push(Value::Array(vec![
                    Value::Bytes(key.clone()),
                    Value::Array(entries),
                ]));
            }
        }

        if out.is_empty() {
            Value::Nil
        } else {
            Value::Array(out)
        }
    }

    fn bitfield(&self, rest: &[Bytes]) -> Value {
        self.with_store(rest, |store, rest| {
            let key = rest[0].to_vec();
            let mut overflow = Overflow::Wrap;
            let mut results = Vec::new();
            let mut touched = false;

            let mut i = 1;
            while i < rest.len() {
                let op = String::from_utf8_lossy(&rest[i]).to_uppercase();
                match op.as_str() {
                    "OVERFLOW" => {
                        overflow = match String::from_utf8_lossy(&rest[i + 1])
                            .to_uppercase()
                            .as_str()
                        {
                            "SAT" => Overflow::Sat,
                            "FAIL" => Overflow::Fail,
                            _ => Overflow::Wrap,
                        };
                        i += 2;
                    }
                    "GET" => {
                        let Some((bits, offset)) = parse_field(&rest[i + 1], &rest[i + 2]) else {
                            return Value::Error("ERR invalid bitfield type".to_string());
                        };
                        let buffer = store.strings.entry(key.clone()).or_default();
                        results.push(Value::Int(read_bits(buffer, offset, bits) as i64));
                        i += 3;
                    }
                    "SET" => {
                        let Some((bits, offset)) = parse_field(&rest[i + 1], &rest[i + 2]) else {
                            return Value::Error("ERR invalid bitfield type".to_string());
                        };
                        let value = String::from_utf8_lossy(&rest[i + 3])
                            .parse::<u64>()
                            .unwrap_or(0);
                        let buffer = store.strings.entry(key.clone()).or_default();
                        let previous = read_bits(buffer, offset, bits);
                        write_bits(buffer, offset, bits, value);
                        results.push(Value::Int(previous as i64));
                        touched = true;
                        i += 4;
                    }
                    "INCRBY" => {
                        let Some((bits, offset)) = parse_field(&rest[i + 1], &rest[i + 2]) else {
                            return Value::Error("ERR invalid bitfield type".to_string());
                        };
                        let delta = String::from_utf8_lossy(&rest[i + 3])
                            .parse::<i64>()
                            .unwrap_or(0);
                        let buffer = store.strings.entry(key.clone()).or_default();
                        let current = read_bits(buffer, offset, bits) as i64;
                        let max = (1_i64 << bits) - 1;
                        let sum = current + delta;

                        let outcome = match overflow {
                            Overflow::Wrap => Some(sum.rem_euclid(max + 1)),
                            Overflow::Sat => Some(sum.clamp(0, max)),
                            Overflow::Fail => (0..=max).contains(&sum).then_some(sum),
                        };
                        match outcome {
                            Some(next) => {
                                write_bits(buffer, offset, bits, next as u64);
                                results.push(Value::Int(next));
                                touched = true;
                            }
                            None => results.push(Value::Nil),
                        }
                        i += 4;
                    }
                    _ => return Value::Error(format!("ERR unknown BITFIELD op '{op}'")),
                }
            }

            if touched {
                store.touch(&key);
            }
            Value::Array(results)
        })
    }
}

#[derive(Clone, Copy)]
enum Overflow {
    Wrap,
    Sat,
    Fail,
}

fn parse_field(spec: &Bytes, offset: &Bytes) -> Option<(u32, u64)> {
    let spec = String::from_utf8_lossy(spec).into_owned();
    // Unsigned fields only; wide enough for the binding layer's tests
    let bits = spec.strip_prefix('u')?.parse::<u32>().ok()?;
    let offset = String::from_utf8_lossy(offset).parse::<u64>().ok()?;
    (bits >= 1 && bits <= 63).then_some((bits, offset))
}

fn read_bits(buffer: &[u8], offset: u64, bits: u32) -> u64 {
    let mut value = 0u64;
    for i in 0..bits {
        let bit_index = offset + u64::from(i);
        let byte = (bit_index / 8) as usize;
        let shift = 7 - (bit_index % 8) as u32;
        let bit = buffer
            .get(byte)
            .map_or(0, |b| u64::from((b >> shift) & 1));
        value = (value << 1) | bit;
    }
    value
}

fn write_bits(buffer: &mut Vec<u8>, offset: u64, bits: u32, value: u64) {
    let last_byte = ((offset + u64::from(bits) - 1) / 8) as usize;
    if buffer.len() <= last_byte {
        buffer.resize(last_byte + 1, 0);
    }
    for i in 0..bits {
        let bit_index = offset + u64::from(i);
        let byte = (bit_index / 8) as usize;
        let shift = 7 - (bit_index % 8) as u32;
        let bit = ((value >> (bits - 1 - i)) & 1) as u8;
        buffer[byte] = (buffer[byte] & !(1 << shift)) | (bit << shift);
    }
}

fn parse_int(arg: Option<&Bytes>) -> Result<i64, Value> {
    arg.and_then(|a| String::from_utf8_lossy(a).parse::<i64>().ok())
        .ok_or_else(|| Value::Error("ERR value is not an integer or out of range".to_string()))
}

fn string_value(value: Option<&Vec<u8>>) -> Value {
    value.map_or(Value::Nil, |v| Value::Bytes(Bytes::from(v.clone())))
}

fn stream_entry_value(entry: &(String, Vec<(Vec<u8>, Vec<u8>)>)) -> Value {
    let (id, fields) = entry;
    let mut flat = Vec::new();
    for (field, value) in fields {
        flat.push(Value::Bytes(Bytes::from(field.clone())));
        flat.push(Value::Bytes(Bytes::from(value.clone())));
    }
    Value::Array(vec![
        Value::Bytes(Bytes::from(id.clone().into_bytes())),
        Value::Array(flat),
    ])
}

fn format_score(score: f64) -> Vec<u8> {
    if score.fract() == 0.0 {
        format!("{}", score as i64).into_bytes()
    } else {
        format!("{score}").into_bytes()
    }
}

fn index_of(arg: &Bytes, len: usize) -> usize {
    let index = String::from_utf8_lossy(arg).parse::<i64>().unwrap_or(0);
    if index < 0 {
        len.saturating_sub(index.unsigned_abs() as usize)
    } else {
        index as usize
    }
}

fn scan_batch<T, F>(rest: &[Bytes], items: &[T], render: F) -> Value
where
    F: Fn(&T) -> Value,
{
    let cursor = rest
        .first()
        .map(|c| String::from_utf8_lossy(c).parse::<usize>().unwrap_or(0))
        .unwrap_or(0);
    let count = scan_option(rest, b"COUNT")
        .and_then(|c| String::from_utf8_lossy(&c).parse::<usize>().ok())
        .unwrap_or(10);
    let pattern = scan_option(rest, b"MATCH");

    let end = (cursor + count).min(items.len());
    let batch: Vec<Value> = items[cursor.min(end)..end].iter().map(&render).collect();

    // Pattern filtering applies per batch, like the server does
    let batch = match &pattern {
        Some(pattern) => batch
            .into_iter()
            .filter(|value| match value {
                Value::Bytes(b) => glob_match(pattern, b),
                _ => true,
            })
            .collect(),
        None => batch,
    };

    let next = if end >= items.len() { 0 } else { end };
    Value::Array(vec![
        Value::Bytes(Bytes::from(next.to_string().into_bytes())),
        Value::Array(batch),
    ])
}

fn scan_pairs(rest: &[Bytes], pairs: &[(Vec<u8>, Vec<u8>)]) -> Value {
    let cursor = rest
        .first()
        .map(|c| String::from_utf8_lossy(c).parse::<usize>().unwrap_or(0))
        .unwrap_or(0);
    let count = scan_option(rest, b"COUNT")
        .and_then(|c| String::from_utf8_lossy(&c).parse::<usize>().ok())
        .unwrap_or(10);

    let end = (cursor + count).min(pairs.len());
    let mut batch = Vec::new();
    for (field, value) in &pairs[cursor..end] {
        batch.push(Value::Bytes(Bytes::from(field.clone())));
        batch.push(Value::Bytes(Bytes::from(value.clone())));
    }

    let next = if end >= pairs.len() { 0 } else { end };
    Value::Array(vec![
        Value::Bytes(Bytes::from(next.to_string().into_bytes())),
        Value::Array(batch),
    ])
}

fn scan_option(rest: &[Bytes], name: &[u8]) -> Option<Bytes> {
    rest.iter()
        .position(|arg| arg.eq_ignore_ascii_case(name))
        .and_then(|at| rest.get(at + 1))
        .cloned()
}

/// Glob matching with `*` wildcards, enough for test patterns
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let segments: Vec<&[u8]> = pattern.split(|&b| b == b'*').collect();
    if segments.len() == 1 {
        return pattern == text;
    }

    let mut position = 0;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            if !text.starts_with(segment) {
                return false;
            }
            position = segment.len();
        } else if i == segments.len() - 1 {
            return text.len() >= position + segment.len() && text.ends_with(segment);
        } else {
            match find_from(text, position, segment) {
                Some(found) => position = found + segment.len(),
                None => return false,
            }
        }
    }
    true
}

fn find_from(text: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= text.len() {
        return None;
    }
    text[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|at| from + at)
}

#[async_trait]
impl NativeClient for MemoryClient {
    async fn request(&mut self, args: Vec<Bytes>) -> ValkeyResult<Value> {
        match self.dispatch(&args) {
            Value::Error(msg) => Err(ValkeyError::Server(msg)),
            value => Ok(value),
        }
    }

    async fn request_batch(
        &mut self,
        commands: Vec<Vec<Bytes>>,
        atomic: bool,
    ) -> ValkeyResult<Option<Vec<BatchEntry>>> {
        if atomic {
            let conflicted = {
                let store = self.store.lock().unwrap();
                self.watched
                    .iter()
                    .any(|(key, version)| store.version(key) != *version)
            };
            self.watched.clear();
            if conflicted {
                return Ok(None);
            }
        }

        let entries = commands
            .iter()
            .map(|command| match self.dispatch(command) {
                Value::Error(msg) => Err(ValkeyError::Server(msg)),
                value => Ok(value),
            })
            .collect();
        Ok(Some(entries))
    }
}

use valkey_bridge::{Connection, ConnectionConfig, StandaloneAdapter};

/// A connection over a fresh in-memory store
pub fn memory_connection() -> (Connection<StandaloneAdapter>, SharedStore) {
    let store = shared_store();
    let conn = Connection::new(
        StandaloneAdapter::new(Box::new(MemoryClient::new(store.clone()))),
        ConnectionConfig::default(),
    );
    (conn, store)
}
