/*
 * Created on Wed Mar 01 2023
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

/// Declare an action: a generic async handler over any buffered socket
/// stream, with the standard `(handle, con, sess, act)` signature
macro_rules! action {
    (
        $(#[$attr:meta])*
        fn $name:ident($handle:ident: &Corestore, $con:ident: &mut Connection<T>, $sess:ident: &mut Session, mut $act:ident: ActionIter<'_>) $block:block
    ) => {
        $(#[$attr])*
        pub async fn $name<T>(
            $handle: &crate::corestore::Corestore,
            $con: &mut crate::dbnet::Connection<T>,
            $sess: &mut crate::dbnet::Session,
            mut $act: crate::queryengine::ActionIter<'_>,
        ) -> crate::actions::ActionResult<()>
        where
            T: crate::dbnet::BufferedSocketStream,
        $block
    };
    (
        $(#[$attr:meta])*
        fn $name:ident($handle:ident: &Corestore, $con:ident: &mut Connection<T>, $sess:ident: &mut Session, $act:ident: ActionIter<'_>) $block:block
    ) => {
        $(#[$attr])*
        pub async fn $name<T>(
            $handle: &crate::corestore::Corestore,
            $con: &mut crate::dbnet::Connection<T>,
            $sess: &mut crate::dbnet::Session,
            $act: crate::queryengine::ActionIter<'_>,
        ) -> crate::actions::ActionResult<()>
        where
            T: crate::dbnet::BufferedSocketStream,
        $block
    };
}
