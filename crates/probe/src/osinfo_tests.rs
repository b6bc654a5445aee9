// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn pretty_name_is_unquoted() {
    let contents = "NAME=\"Debian GNU/Linux\"\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n";
    assert_eq!(
        pretty_name(contents).as_deref(),
        Some("Debian GNU/Linux 12 (bookworm)")
    );
}

#[test]
fn missing_pretty_name_yields_none() {
    assert!(pretty_name("NAME=\"Alpine\"\nVERSION_ID=3.20\n").is_none());
}
