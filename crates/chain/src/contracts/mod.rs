//! Contract ABIs consumed by the agent.

pub mod dex;
pub mod liquidation;
pub mod pool;

pub use dex::{ICurvePool, IUniswapV2Pair, IUniswapV2Router, IUniswapV3Pool};
pub use liquidation::{
    decode_pair_path, decode_v2_path, decode_v3_path, encode_execute, encode_pair_path,
    encode_v2_path, encode_v3_path, ContractMethod, ExecuteParams, SwapKind, SwapLeg,
};
pub use pool::{AccountHealth, IAaveOracle, IERC20, IPool, IProtocolDataProvider, ReserveConfig};
