// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use clap::Parser;
use koral_server::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    koral_server::serve(Args::parse()).await
}
