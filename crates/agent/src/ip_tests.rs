// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn first_ipv4_handles_separators_and_garbage() {
    assert_eq!(
        first_ipv4_from_str("10.0.0.1,127.0.0.1"),
        Some("10.0.0.1".to_string())
    );
    assert_eq!(
        first_ipv4_from_str("  10.0.0.1 192.168.1.1 "),
        Some("10.0.0.1".to_string())
    );
    assert_eq!(
        first_ipv4_from_str("nonsense; 172.16.0.9"),
        Some("172.16.0.9".to_string())
    );
    assert_eq!(first_ipv4_from_str("fe80::1"), None);
    assert_eq!(first_ipv4_from_str(""), None);
}

#[test]
fn fib_trie_scan_finds_the_local_host_entry() {
    // Captured shape of /proc/net/fib_trie in a minimal container.
    let data = "\
Main:
  +-- 0.0.0.0/0 3 0 5
     |-- 0.0.0.0
        /0 universe UNICAST
     +-- 10.2.0.0/24 2 0 2
        |-- 10.2.0.0
           /32 link BROADCAST
           /24 link UNICAST
        |-- 10.2.0.13
           /32 host LOCAL
        |-- 10.2.0.255
           /32 link BROADCAST
Local:
  +-- 127.0.0.0/8 2 0 2
     |-- 127.0.0.1
        /32 host LOCAL
";
    assert_eq!(
        local_ipv4_from_fib_trie(data),
        Some("10.2.0.13".to_string())
    );
}

#[test]
fn fib_trie_scan_skips_loopback_and_zero() {
    let loopback_only = "\
Local:
  +-- 127.0.0.0/8 2 0 2
     |-- 127.0.0.1
        /32 host LOCAL
";
    assert_eq!(local_ipv4_from_fib_trie(loopback_only), None);

    let zero = "|-- 0.0.0.0\n   /32 host LOCAL\n";
    assert_eq!(local_ipv4_from_fib_trie(zero), None);
}

#[test]
fn fib_trie_scan_ignores_broadcast_attributes() {
    let data = "\
|-- 10.2.0.255
   /32 link BROADCAST
|-- 10.2.0.7
   /32 host LOCAL
";
    assert_eq!(local_ipv4_from_fib_trie(data), Some("10.2.0.7".to_string()));
}
