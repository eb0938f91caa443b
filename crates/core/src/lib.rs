// regscope - Peripheral Register Inspector
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod codec;
pub mod value;

pub use codec::{format, parse, validator, Base, FormatError, Validation, Validator};
pub use value::{decompose, recompose, RegisterValueModel, ValueError};
