// SPDX-License-Identifier: GPL-3.0-only

//! Message handlers, split by scanner responsibility

mod acquire;
mod lifecycle;
mod poll;
mod surface;
mod verify;
