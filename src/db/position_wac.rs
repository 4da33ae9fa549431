// Copyright (c) 2024 MoonTrack

//! DB impl for the `position_wac` display table: a denormalized weighted-
//! average-cost snapshot per `(account_id, asset)`, refreshed after every
//! tax-lot acquisition/disposal rather than computed on read (§4.11).

use diesel::prelude::*;
use uuid::Uuid;

use super::{
    models::{NewPositionWac, PositionWac},
    schema::position_wac,
    Conn,
};
use crate::error::WalletDbError;

pub trait PositionWacModel {
    fn upsert(new: &NewPositionWac, conn: &mut Conn) -> Result<PositionWac, WalletDbError>;

    fn get(account_id: Uuid, asset: &str, conn: &mut Conn) -> Result<Option<PositionWac>, WalletDbError>;
}

impl PositionWacModel for PositionWac {
    fn upsert(new: &NewPositionWac, conn: &mut Conn) -> Result<PositionWac, WalletDbError> {
        diesel::insert_into(position_wac::table)
            .values(new)
            .on_conflict((position_wac::account_id, position_wac::asset))
            .do_update()
            .set((new, position_wac::refreshed_at.eq(diesel::dsl::now)))
            .get_result(conn)
            .map_err(Into::into)
    }

    fn get(account_id: Uuid, asset: &str, conn: &mut Conn) -> Result<Option<PositionWac>, WalletDbError> {
        position_wac::table
            .filter(position_wac::account_id.eq(account_id))
            .filter(position_wac::asset.eq(asset))
            .first(conn)
            .optional()
            .map_err(Into::into)
    }
}
