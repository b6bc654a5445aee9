// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn counts_nonempty_lines_only() {
    assert_eq!(count_nonempty_lines(""), 0);
    assert_eq!(count_nonempty_lines("\n  \n"), 0);
    assert_eq!(count_nonempty_lines("  root centos -wi-ao---- \n  swap centos\n"), 2);
}
