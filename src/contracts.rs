//! Contract bindings used by the pipeline.
//!
//! Only the functions the pipeline calls are declared. Reads go through the
//! generated `#[sol(rpc)]` instances in [`crate::chain`]; writes are
//! described by [`ContractCall`] and encoded here.

use alloy::{primitives::Bytes, sol, sol_types::SolCall};

use crate::types::ContractCall;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    #[sol(rpc)]
    interface IWETH9 {
        function deposit() external payable;
    }

    #[sol(rpc)]
    interface IUniswapV3Pool {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function fee() external view returns (uint24);
        function liquidity() external view returns (uint128);
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );
    }

    #[sol(rpc)]
    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }

    #[sol(rpc)]
    interface IOFT {
        function estimateSendFee(
            uint16 dstChainId,
            bytes calldata toAddress,
            uint256 amount,
            bool useZro,
            bytes calldata adapterParams
        ) external view returns (uint256 nativeFee, uint256 zroFee);

        function sendFrom(
            address from,
            uint16 dstChainId,
            bytes calldata toAddress,
            uint256 amount,
            address refundAddress,
            address zroPaymentAddress,
            bytes calldata adapterParams
        ) external payable;
    }
}

impl ContractCall {
    /// ABI-encodes the call, selector included.
    pub fn encode(&self) -> Bytes {
        let data = match self {
            ContractCall::Approve { spender, amount } => IERC20::approveCall {
                spender: *spender,
                amount: *amount,
            }
            .abi_encode(),
            ContractCall::Deposit => IWETH9::depositCall {}.abi_encode(),
            ContractCall::ExactInputSingle(params) => ISwapRouter::exactInputSingleCall {
                params: ISwapRouter::ExactInputSingleParams {
                    tokenIn: params.token_in,
                    tokenOut: params.token_out,
                    fee: params.fee,
                    recipient: params.recipient,
                    deadline: params.deadline,
                    amountIn: params.amount_in,
                    amountOutMinimum: params.amount_out_minimum,
                    sqrtPriceLimitX96: params.sqrt_price_limit_x96,
                },
            }
            .abi_encode(),
            ContractCall::SendFrom(transfer) => IOFT::sendFromCall {
                from: transfer.from,
                dstChainId: transfer.destination_chain_id,
                toAddress: Bytes::copy_from_slice(transfer.to.as_slice()),
                amount: transfer.amount,
                refundAddress: transfer.refund_address,
                zroPaymentAddress: transfer.zro_payment_address,
                adapterParams: transfer.adapter_params.clone(),
            }
            .abi_encode(),
        };
        Bytes::from(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BridgeTransfer, SwapParams};
    use alloy::primitives::{
        aliases::{U160, U24},
        Address, U256,
    };

    #[test]
    fn calls_start_with_their_selector() {
        let approve = ContractCall::Approve {
            spender: Address::repeat_byte(0x11),
            amount: U256::MAX,
        };
        assert_eq!(&approve.encode()[..4], IERC20::approveCall::SELECTOR.as_slice());

        let deposit = ContractCall::Deposit.encode();
        assert_eq!(deposit.as_ref(), IWETH9::depositCall::SELECTOR.as_slice());
    }

    #[test]
    fn swap_and_bridge_encode_with_arguments() {
        let swap = ContractCall::ExactInputSingle(SwapParams {
            token_in: Address::repeat_byte(0x01),
            token_out: Address::repeat_byte(0x02),
            fee: U24::from(3000u32),
            recipient: Address::repeat_byte(0x03),
            deadline: U256::from(1_700_000_600u64),
            amount_in: U256::from(10u64),
            amount_out_minimum: U256::ZERO,
            sqrt_price_limit_x96: U160::ZERO,
        })
        .encode();
        assert_eq!(&swap[..4], ISwapRouter::exactInputSingleCall::SELECTOR.as_slice());
        // selector + eight static words
        assert_eq!(swap.len(), 4 + 8 * 32);

        let bridge = ContractCall::SendFrom(BridgeTransfer {
            from: Address::repeat_byte(0x03),
            destination_chain_id: 154,
            to: Address::repeat_byte(0x03),
            amount: U256::from(10u64),
            refund_address: Address::repeat_byte(0x03),
            zro_payment_address: Address::ZERO,
            adapter_params: Bytes::new(),
        })
        .encode();
        assert_eq!(&bridge[..4], IOFT::sendFromCall::SELECTOR.as_slice());
    }
}
