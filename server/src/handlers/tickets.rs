use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use crate::models::{Caller, TicketCode};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn my_tickets(State(state): State<AppState>, caller: Caller) -> Result<Response, AppError> {
    let tickets = state.tickets.list_for(&caller).await?;
    Ok(success(tickets, "Your tickets").into_response())
}

pub async fn get_ticket(
    State(state): State<AppState>,
    caller: Caller,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let ticket = state.tickets.get(&TicketCode::from(code), &caller).await?;
    Ok(success(ticket, "Ticket found").into_response())
}

pub async fn cancel_ticket(
    State(state): State<AppState>,
    caller: Caller,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let ticket = state.tickets.cancel(&TicketCode::from(code), &caller).await?;
    Ok(success(ticket, "Ticket cancelled").into_response())
}
