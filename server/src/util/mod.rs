/*
 * Created on Wed Feb 15 2023
 *
 * This file is a part of Ferrite
 * Ferrite is a free and open-source Redis-compatible in-memory database
 * implemented in Rust, aiming to stay faithful to the Redis 1.0 wire
 * protocol while keeping the engine small and predictable.
 *
 * Copyright (c) 2023, the Ferrite developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

pub mod error;

pub use error::{Error, FerResult};

use core::future::Future;
use core::pin::Pin;

/// A future boxed for use in the explicit async-trait declarations
pub type FutureResult<'s, T> = Pin<Box<dyn Future<Output = T> + Send + 's>>;

/// The process exit code used for any startup or shutdown failure
pub const EXITCODE_ERROR: i32 = 0x100;
