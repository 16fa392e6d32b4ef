// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

fn main() -> anyhow::Result<()> {
    let cfg = build_board_config::BoardConfig::load()?;
    cfg.write_to_out_dir("board_config.rs")?;
    Ok(())
}
